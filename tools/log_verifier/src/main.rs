use coastal_core::audit::integrity::{verify_chain, verify_entries};
use coastal_core::audit::report::ComplianceExport;
use serde_json::json;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: log_verifier <path/to/compliance_export.json>");
        std::process::exit(2);
    }
    let path = std::path::Path::new(&args[1]);

    let raw = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("cannot read {}: {}", path.display(), e);
            std::process::exit(2);
        }
    };
    let export: ComplianceExport = match serde_json::from_str(&raw) {
        Ok(x) => x,
        Err(e) => {
            eprintln!("not a JSON compliance export: {}", e);
            std::process::exit(2);
        }
    };

    let integrity = verify_entries(&export.logs);
    let chain = verify_chain(&export.logs);
    let count_ok = export.total_records == export.logs.len();
    let pass = integrity.invalid_count == 0 && chain.is_valid && count_ok;

    let summary = json!({
        "export_id": export.export_id,
        "overall": if pass { "PASS" } else { "FAIL" },
        "record_count_matches": count_ok,
        "integrity": integrity,
        "chain": chain,
    });
    match serde_json::to_string_pretty(&summary) {
        Ok(s) => println!("{}", s),
        Err(e) => {
            eprintln!("cannot render summary: {}", e);
            std::process::exit(1);
        }
    }
    if !pass {
        std::process::exit(1);
    }
}
