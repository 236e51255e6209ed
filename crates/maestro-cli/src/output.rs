use maestro_core::doctor::CheckResult;
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

/// Render doctor results, one line per check with the fix under failures.
pub fn print_checks(results: &[CheckResult]) {
    let width = results.iter().map(|r| r.name.len()).max().unwrap_or(0);
    for r in results {
        let symbol = match (r.ok, r.is_warning) {
            (true, _) => "✓",
            (false, true) => "⚠",
            (false, false) => "✗",
        };
        println!("{symbol} {:width$}  {}", r.name, r.message);
        if let (false, Some(fix)) = (r.ok, &r.fix) {
            println!("  Fix: {fix}");
        }
    }
}
