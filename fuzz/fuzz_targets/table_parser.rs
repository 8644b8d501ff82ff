#![no_main]

use connectome_ksample::dataset::parse_matrix;
use connectome_ksample::table::Table;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Neither parser may panic, whatever the input
        if let Ok(table) = Table::parse(input) {
            for header in table.headers() {
                let _ = table.bool_column(header);
                let _ = table.parse_column::<f64>(header);
            }
        }
        let _ = parse_matrix(input);
    }
});
