// Resolution of types that live in dependency crates outside the scanned tree
use openapi_from_decls::{
    config::SynthesisConfig,
    loader::DirectoryLoader,
    parser::AstParser,
    registry::Registry,
    scanner::FileScanner,
    schema::Schema,
    schema_generator::SchemaGenerator,
    type_resolver::TypeResolver,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, path: &str, content: &str) {
    let file_path = root.join(path);
    fs::create_dir_all(file_path.parent().unwrap()).unwrap();
    fs::write(file_path, content).unwrap();
}

/// A project whose `billing` module uses a type from the `money` crate, vendored as `money-1.2.0`
fn workspace() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "app/src/lib.rs", "pub mod billing;");
    write(
        root,
        "app/src/billing.rs",
        "use money::amount::Amount;\npub struct Invoice { pub number: u32, pub total: Amount }",
    );
    write(root, "vendor/money-1.2.0/src/lib.rs", "pub mod amount;");
    write(
        root,
        "vendor/money-1.2.0/src/amount.rs",
        "pub struct Amount { pub cents: i64, pub currency: String }",
    );
    temp_dir
}

fn generator(temp_dir: &TempDir, parse_dependencies: bool) -> SchemaGenerator {
    let scan = FileScanner::new(temp_dir.path().join("app")).scan().unwrap();
    let mut registry = Registry::new();
    for source in AstParser::parse_units(&scan.units) {
        registry.index_source(&source.unwrap());
    }
    let loader = DirectoryLoader::new().with_search_dir(temp_dir.path().join("vendor"));
    let config = SynthesisConfig {
        parse_dependencies,
        ..SynthesisConfig::default()
    };
    SchemaGenerator::new(TypeResolver::new(registry).with_loader(Box::new(loader)), config)
}

#[test]
fn test_dependency_loaded_on_demand() {
    let temp_dir = workspace();
    let mut schema_gen = generator(&temp_dir, true);
    let billing = schema_gen.resolver().registry().find_file("crate::billing").unwrap();
    assert!(!schema_gen.resolver().registry().has_crate("money"));

    let schema = schema_gen.schema_for_type_ref("Invoice", billing).unwrap();
    assert_eq!(schema, Schema::reference("billing.Invoice"));
    assert!(schema_gen.resolver().registry().has_crate("money"));

    let invoice = &schema_gen.definitions()["billing.Invoice"];
    assert_eq!(
        invoice.properties.as_ref().unwrap()["total"],
        Schema::reference("amount.Amount")
    );
    let amount = schema_gen.definitions()["amount.Amount"].properties.clone().unwrap();
    assert_eq!(amount.keys().collect::<Vec<_>>(), vec!["cents", "currency"]);
}

#[test]
fn test_dependency_type_falls_back_without_loading() {
    let temp_dir = workspace();
    let mut schema_gen = generator(&temp_dir, false);
    let billing = schema_gen.resolver().registry().find_file("crate::billing").unwrap();

    schema_gen.schema_for_type_ref("Invoice", billing).unwrap();
    let invoice = &schema_gen.definitions()["billing.Invoice"];
    assert_eq!(invoice.properties.as_ref().unwrap()["total"], Schema::object());
    assert!(!schema_gen.resolver().registry().has_crate("money"));
}
