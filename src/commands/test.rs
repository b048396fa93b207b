//! Production test commands

use super::image::format_grid;
use super::limits::LimitFile;
use std::fs;
use std::path::Path;
use synadiag_core::hires::HighResistanceLimits;
use synadiag_core::image::Image;
use synadiag_core::Geometry;
use synadiag_session::DeviceManager;

/// Report type of the RMI TRX short test
const TRX_SHORT: u32 = 26;

/// Run one production test against a limits file
pub fn run_test(
    mgr: &mut DeviceManager,
    id: u32,
    limits: &Path,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let limits = LimitFile::from_toml_file(limits)?;
    let rows = mgr.image_rows(false)?;
    let cols = mgr.image_cols(false)?;
    let len = mgr.test_result_len(id)?;

    let mut result = vec![0i32; len];
    let failures = mgr.run_production_test(
        id,
        &mut result,
        &limits.min,
        &limits.max,
        Geometry::new(rows, cols),
    )?;

    // Image-shaped results print as a grid
    let width = if len == rows * cols { cols } else { len };
    print!("{}", format_grid(&result, width));
    if let Some(path) = output {
        let lines: Vec<String> = result
            .chunks(width.max(1))
            .map(|row| {
                row.iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .collect();
        fs::write(path, lines.join("\n") + "\n")?;
        println!("Wrote result to {:?}", path);
    }

    report_outcome(&format!("Test {}", id), failures)
}

/// Run the extended high-resistance test
pub fn run_hires(mgr: &mut DeviceManager, limits: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let limits = LimitFile::from_toml_file(limits)?;
    limits.require("reference", &limits.reference)?;
    let rows = mgr.image_rows(false)?;
    let cols = mgr.image_cols(false)?;
    let reference = Image::from_vec(rows, cols, limits.reference.clone())?;

    let report = mgr.run_extended_high_resistance(
        &reference,
        &HighResistanceLimits {
            surface: &limits.surface,
            tx_roe: &limits.tx_roe,
            rx_roe: &limits.rx_roe,
        },
    )?;

    let r = &report.result;
    println!("RX run-out:");
    print!("{}", format_grid(&r.rx_roe, r.rx_roe.len()));
    println!("TX run-out:");
    print!("{}", format_grid(&r.tx_roe, r.tx_roe.len()));
    println!("Surface:");
    print!("{}", format_grid(r.surface.data(), r.surface.cols()));
    println!(
        "Failures: {} surface, {} tx, {} rx",
        report.failures.surface, report.failures.tx, report.failures.rx
    );

    report_outcome("Extended high resistance", report.failures.total())
}

/// Run the TRX short test with extended pin confirmation
pub fn run_trx_short(
    mgr: &mut DeviceManager,
    limits: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let limits = LimitFile::from_toml_file(limits)?;
    limits.require("min", &limits.min)?;
    limits.require("delta", &limits.delta)?;

    let mut result = vec![0i32; mgr.test_result_len(TRX_SHORT)?];
    let failures = mgr.run_extended_trx_short(&mut result, &limits.min, &limits.delta)?;

    for (pin, &v) in result.iter().enumerate() {
        if v > 0 {
            println!("Pin {} shorted", pin);
        }
    }
    report_outcome("TRX short", failures)
}

fn report_outcome(name: &str, failures: usize) -> Result<(), Box<dyn std::error::Error>> {
    if failures == 0 {
        println!("{}: PASS", name);
        Ok(())
    } else {
        println!("{}: FAIL", name);
        Err(format!("{} failed with {} failures", name, failures).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome() {
        assert!(report_outcome("t", 0).is_ok());
        let err = report_outcome("t", 3).unwrap_err();
        assert_eq!(err.to_string(), "t failed with 3 failures");
    }

    #[cfg(all(feature = "dummy", feature = "tcm"))]
    #[test]
    fn test_missing_reference_fails_before_device_access() {
        use synadiag_session::SessionConfig;

        let path = std::env::temp_dir().join(format!("synadiag-hires-{}.toml", std::process::id()));
        fs::write(&path, "surface = [10]\ntx_roe = [5]\nrx_roe = [5]\n").unwrap();
        let mut mgr = DeviceManager::new(SessionConfig::default());
        mgr.open_device("dummy-tcm").unwrap();
        let err = run_hires(&mut mgr, &path).unwrap_err();
        assert!(err.to_string().contains("reference"));
        fs::remove_file(&path).unwrap();
    }
}
