//! Python bindings

use std::fs;
use std::path::Path;

use pyo3::prelude::*;

use crate::{convert_metafile_to_svg, is_emf_format, is_wmf_format};

fn check_format(data: &[u8]) -> PyResult<()> {
    if !is_emf_format(data) && !is_wmf_format(data) {
        return Err(PyErr::new::<pyo3::exceptions::PyValueError, _>(
            "Input must be EMF or WMF data",
        ));
    }
    Ok(())
}

/// Convert an EMF/WMF file to an SVG file
///
/// Args:
///     input_path: Path to input EMF/WMF file
///     output_path: Path to output SVG file
///     width: Target width, 0 keeps the picture size
///     height: Target height, 0 keeps the picture size
///
/// Returns:
///     True if conversion successful
#[pyfunction]
#[pyo3(signature = (input_path, output_path, width = 0, height = 0))]
fn convert_emf_to_svg(input_path: &str, output_path: &str, width: u32, height: u32) -> PyResult<bool> {
    let input = Path::new(input_path);
    if !input.exists() {
        return Err(PyErr::new::<pyo3::exceptions::PyFileNotFoundError, _>(format!(
            "Input file not found: {}",
            input_path
        )));
    }

    let data = fs::read(input).map_err(|e| {
        PyErr::new::<pyo3::exceptions::PyIOError, _>(format!("Failed to read input file: {}", e))
    })?;
    check_format(&data)?;

    let svg_content = convert_metafile_to_svg(&data, width, height)?;
    fs::write(output_path, svg_content).map_err(|e| {
        PyErr::new::<pyo3::exceptions::PyIOError, _>(format!("Failed to write output file: {}", e))
    })?;
    Ok(true)
}

/// Convert EMF/WMF bytes to an SVG string
///
/// Args:
///     data: EMF/WMF data as bytes
///     width: Target width, 0 keeps the picture size
///     height: Target height, 0 keeps the picture size
///
/// Returns:
///     SVG content as string
#[pyfunction]
#[pyo3(signature = (data, width = 0, height = 0))]
fn convert_emf_bytes_to_svg(data: &[u8], width: u32, height: u32) -> PyResult<String> {
    check_format(data)?;
    Ok(convert_metafile_to_svg(data, width, height)?)
}

/// Python module definition
#[pymodule]
fn emf_player(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(convert_emf_to_svg, m)?)?;
    m.add_function(wrap_pyfunction!(convert_emf_bytes_to_svg, m)?)?;
    Ok(())
}
