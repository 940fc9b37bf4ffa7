//! Parser fuzz target: feed arbitrary text to the schema parser, then resolve
//! every reference of whatever parsed. Neither step may panic.
//! Build with: cargo fuzz run parser_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    if let Ok(schema) = scopeidl::parse(s) {
        let _ = schema.reference_errors();
        for m in schema.all_messages() {
            let _ = m.sub_messages(&schema);
        }
        let _ = scopeidl::msgdefs::definitions(&schema);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run parser_fuzz");
}
