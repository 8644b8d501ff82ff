//! Omnibus embedding benchmark
//!
//! Embeds collections of planted two-block graphs with automatic dimension
//! selection.
//!
//! # Run Instructions
//!
//! ```bash
//! cargo bench --bench omnibus_embedding
//! ```

use connectome_ksample::embed::OmnibusEmbed;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn planted_graphs(n_graphs: usize, n_vertices: usize) -> Vec<Array2<f64>> {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    (0..n_graphs)
        .map(|_| {
            let mut graph = Array2::zeros((n_vertices, n_vertices));
            for i in 0..n_vertices {
                for j in (i + 1)..n_vertices {
                    let p = if (i < n_vertices / 2) == (j < n_vertices / 2) { 0.7 } else { 0.1 };
                    if rng.gen::<f64>() < p {
                        graph[[i, j]] = 1.0;
                        graph[[j, i]] = 1.0;
                    }
                }
            }
            graph
        })
        .collect()
}

fn bench_fit_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("omnibus_fit_transform");
    group.sample_size(10);

    for (n_graphs, n_vertices) in [(8, 50), (16, 100), (32, 332)] {
        let graphs = planted_graphs(n_graphs, n_vertices);
        let id = BenchmarkId::from_parameter(format!("{}x{}", n_graphs, n_vertices));
        group.bench_with_input(id, &graphs, |b, graphs| {
            let embed = OmnibusEmbed::new();
            b.iter(|| black_box(embed.fit_transform(black_box(graphs)).expect("embed")));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fit_transform);
criterion_main!(benches);
