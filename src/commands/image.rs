//! Image capture command

use crate::cli::StreamArgs;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use synadiag_core::image::Image;
use synadiag_session::DeviceManager;

/// Run the image command
///
/// With `stream` set the report is enabled once for every frame, else
/// each frame enables and disables it.
pub fn run_image(
    mgr: &mut DeviceManager,
    report_type: u8,
    frames: u32,
    landscape: bool,
    stream: Option<StreamArgs>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut csv = match output {
        Some(path) => Some(File::create(path)?),
        None => None,
    };

    if let Some(args) = stream {
        mgr.start_report_stream(report_type, args.enable_touch, args.no_sleep, args.rezero)?;
    }
    let captured = capture_frames(mgr, report_type, frames, landscape, csv.as_mut());
    if stream.is_some() {
        mgr.stop_report_stream(report_type)?;
    }
    let captured = captured?;

    if let Some(path) = output {
        println!("Wrote {} frames to {:?}", captured, path);
    }
    Ok(())
}

fn capture_frames(
    mgr: &mut DeviceManager,
    report_type: u8,
    frames: u32,
    landscape: bool,
    mut csv: Option<&mut File>,
) -> Result<u32, Box<dyn std::error::Error>> {
    for frame in 0..frames {
        let img = mgr.report_image(report_type, landscape)?;
        match csv.as_mut() {
            Some(file) => file.write_all(format_csv(&img).as_bytes())?,
            None => {
                println!(
                    "Frame {} ({} x {}, report 0x{:02X}):",
                    frame,
                    img.rows(),
                    img.cols(),
                    report_type
                );
                print!("{}", format_grid(img.data(), img.cols()));
            }
        }
    }
    Ok(frames)
}

/// Right-aligned table of `values`, `cols` per line
pub fn format_grid(values: &[i32], cols: usize) -> String {
    let width = values
        .iter()
        .map(|v| v.to_string().len())
        .max()
        .unwrap_or(1);
    let mut out = String::new();
    for row in values.chunks(cols.max(1)) {
        let cells: Vec<String> = row.iter().map(|v| format!("{:>width$}", v)).collect();
        out.push_str(&cells.join(" "));
        out.push('\n');
    }
    out
}

/// One CSV line per image row, frames separated by a blank line
pub fn format_csv(img: &Image) -> String {
    let mut out = String::new();
    for r in 0..img.rows() {
        let cells: Vec<String> = img.row(r).iter().map(|v| v.to_string()).collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_grid() {
        assert_eq!(format_grid(&[1, -20, 3, 4], 2), " 1 -20\n 3   4\n");
    }

    #[test]
    fn test_format_csv() {
        let img = Image::from_vec(2, 2, vec![1, 2, 3, 4]).unwrap();
        assert_eq!(format_csv(&img), "1,2\n3,4\n\n");
    }
}
