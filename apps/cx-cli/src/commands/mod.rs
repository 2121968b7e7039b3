pub mod provision;
pub mod schema;
pub mod validate;

pub use provision::ProvisionArgs;
pub use schema::ConfigSchemaArgs;
pub use validate::ValidateArgs;

fn print_json(value: &serde_json::Value, pretty: bool) {
    if pretty {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        );
    } else {
        println!("{}", value);
    }
}
