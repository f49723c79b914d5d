use super::print_json;
use compage_core::version::version_string;
use compage_core::{SCHEMA_VERSION, VERSION};
use miette::Result;

pub fn run(json: bool) -> Result<()> {
    if json {
        print_json(&serde_json::json!({
            "name": "compage",
            "version": VERSION,
            "schema_version": SCHEMA_VERSION,
        }));
    } else {
        println!("{}", version_string());
    }
    Ok(())
}
