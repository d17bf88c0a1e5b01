//! ptuflim-python: PyO3 Python bindings for ptuflim.
#![allow(
    clippy::doc_markdown,
    clippy::needless_pass_by_value,
    clippy::uninlined_format_args,
    clippy::elidable_lifetime_names
)]
//!
//! This crate provides Python bindings using PyO3 and numpy
//! for efficient data exchange with Python.

use numpy::{
    IntoPyArray, PyArray1, PyArray2, PyArray4, PyArrayDyn, PyReadonlyArray4, PyReadonlyArrayDyn,
};
use pyo3::prelude::*;
use ptuflim_algorithms::{
    lifetime_from_phasor, mean_arrival_time, median_filter as median3x3, phasor_from_lifetime,
};
use ptuflim_core::{EventBatch, FlimHistogram, PhasorImage};
use ptuflim_io::{ProcessingConfig, PtuFileReader};

fn io_error(context: &str, err: impl std::fmt::Display) -> PyErr {
    pyo3::exceptions::PyIOError::new_err(format!("{context}: {err}"))
}

fn value_error(context: &str, err: impl std::fmt::Display) -> PyErr {
    pyo3::exceptions::PyValueError::new_err(format!("{context}: {err}"))
}

/// Converts a JSON value into the matching Python object via the json module.
fn json_to_py<'py>(py: Python<'py>, value: &serde_json::Value) -> PyResult<Bound<'py, PyAny>> {
    let text = value.to_string();
    py.import("json")?.call_method1("loads", (text,))
}

fn open_reader(context: &str, path: &str, config_json: Option<&str>) -> PyResult<PtuFileReader> {
    let mut reader =
        PtuFileReader::open(path).map_err(|e| io_error(&format!("{context}: open {path}"), e))?;
    if let Some(json) = config_json {
        let config = ProcessingConfig::from_json(json)
            .map_err(|e| value_error(&format!("{context}: config"), e))?;
        reader = reader.with_config(config);
    }
    Ok(reader)
}

/// Read a PTU image file into a FLIM histogram.
///
/// Returns ``(histogram, metadata)`` where ``histogram`` is a ``uint32``
/// array ``[rows, cols, channels, bins]`` and ``metadata`` a dict of header
/// tags plus an acquisition summary under ``"ptuflim"``.
#[pyfunction]
#[pyo3(signature = (path, config_json=None))]
fn read_ptu<'py>(
    py: Python<'py>,
    path: &str,
    config_json: Option<&str>,
) -> PyResult<(Bound<'py, PyArray4<u32>>, Bound<'py, PyAny>)> {
    let reader = open_reader("read_ptu", path, config_json)?;
    let data = reader
        .read_flim()
        .map_err(|e| value_error("read_ptu: read_flim", e))?;
    let metadata = json_to_py(py, &data.metadata_json())?;
    Ok((data.histogram.into_array().into_pyarray(py), metadata))
}

/// Read only the header of a PTU file as a dict.
#[pyfunction]
fn read_header<'py>(py: Python<'py>, path: &str) -> PyResult<Bound<'py, PyAny>> {
    let reader = open_reader("read_header", path, None)?;
    json_to_py(py, &reader.header().to_json())
}

/// Decode all records of a PTU file into overflow-corrected numpy arrays.
///
/// Returns a dict with ``sync``, ``microtime``, ``channel`` and ``special``.
#[pyfunction]
#[pyo3(signature = (path, config_json=None))]
fn decode_events<'py>(
    py: Python<'py>,
    path: &str,
    config_json: Option<&str>,
) -> PyResult<Bound<'py, pyo3::types::PyDict>> {
    let reader = open_reader("decode_events", path, config_json)?;
    let (events, _) = reader
        .decode_events()
        .map_err(|e| value_error("decode_events: decode", e))?;

    let EventBatch {
        sync,
        microtime,
        channel,
        special,
    } = events;

    let dict = pyo3::types::PyDict::new(py);
    dict.set_item("sync", PyArray1::from_vec(py, sync))?;
    dict.set_item("microtime", PyArray1::from_vec(py, microtime))?;
    dict.set_item("channel", PyArray1::from_vec(py, channel))?;
    dict.set_item("special", PyArray1::from_vec(py, special))?;
    Ok(dict)
}

type PhasorArrays<'py> = (
    Bound<'py, PyArrayDyn<f64>>,
    Bound<'py, PyArrayDyn<f64>>,
    Bound<'py, PyArrayDyn<f64>>,
);

/// Phasor components of an array whose last axis is microtime.
///
/// Accepts ``uint32`` or ``float64`` arrays and returns ``(g, s, dc)`` with
/// the microtime axis removed.
#[pyfunction]
#[pyo3(signature = (data, harmonic=1))]
fn phasor_components<'py>(
    py: Python<'py>,
    data: &Bound<'py, PyAny>,
    harmonic: usize,
) -> PyResult<PhasorArrays<'py>> {
    let result = if let Ok(counts) = data.extract::<PyReadonlyArrayDyn<u32>>() {
        ptuflim_algorithms::phasor_transform(&counts.as_array(), harmonic)
    } else {
        let values: PyReadonlyArrayDyn<f64> = data.extract()?;
        ptuflim_algorithms::phasor_transform(&values.as_array(), harmonic)
    };
    let image: PhasorImage = result.map_err(|e| value_error("phasor_components", e))?;

    Ok((
        image.g.into_pyarray(py),
        image.s.into_pyarray(py),
        image.dc.into_pyarray(py),
    ))
}

/// Boolean mask over the microtime axis (last) starting at the most common
/// decay peak.
#[pyfunction]
fn time_mask<'py>(
    py: Python<'py>,
    data: &Bound<'py, PyAny>,
) -> PyResult<Bound<'py, PyArray1<bool>>> {
    let result = if let Ok(counts) = data.extract::<PyReadonlyArrayDyn<u32>>() {
        ptuflim_algorithms::time_mask(&counts.as_array())
    } else {
        let values: PyReadonlyArrayDyn<f64> = data.extract()?;
        ptuflim_algorithms::time_mask(&values.as_array())
    };
    let mask = result.map_err(|e| value_error("time_mask", e))?;
    Ok(mask.into_pyarray(py))
}

/// 3x3 median over the first two axes of ``values``, ``n`` passes.
#[pyfunction]
#[pyo3(signature = (values, n=1))]
fn median_filter<'py>(
    py: Python<'py>,
    values: PyReadonlyArrayDyn<f64>,
    n: usize,
) -> PyResult<Bound<'py, PyArrayDyn<f64>>> {
    let filtered = median3x3(&values.as_array().to_owned(), n)
        .map_err(|e| value_error("median_filter", e))?;
    Ok(filtered.into_pyarray(py))
}

/// Fast-FLIM image: mean photon arrival time (ns) per pixel for one channel.
#[pyfunction]
#[pyo3(signature = (histogram, channel=0, gate=None, resolution_ns=1.0))]
fn fast_flim<'py>(
    py: Python<'py>,
    histogram: PyReadonlyArray4<u32>,
    channel: usize,
    gate: Option<(usize, usize)>,
    resolution_ns: f64,
) -> PyResult<Bound<'py, PyArray2<f64>>> {
    let histogram = FlimHistogram::from_array(histogram.as_array().to_owned());
    let gate = gate.map_or(0..histogram.bins(), |(start, stop)| start..stop);
    let image = mean_arrival_time(&histogram, channel, gate, resolution_ns)
        .map_err(|e| value_error("fast_flim", e))?;
    Ok(image.into_pyarray(py))
}

/// Reference phasor ``(g, s)`` of a mono-exponential decay.
#[pyfunction]
#[pyo3(signature = (tau_ns, frequency_mhz, harmonic=1))]
fn lifetime_to_phasor(tau_ns: f64, frequency_mhz: f64, harmonic: usize) -> (f64, f64) {
    phasor_from_lifetime(tau_ns, frequency_mhz, harmonic)
}

/// Phase and modulation lifetimes ``(tau_phase, tau_mod)`` in ns.
#[pyfunction]
#[pyo3(signature = (g, s, frequency_mhz, harmonic=1))]
fn phasor_to_lifetime(g: f64, s: f64, frequency_mhz: f64, harmonic: usize) -> (f64, f64) {
    lifetime_from_phasor(g, s, frequency_mhz, harmonic)
}

/// Python module for ptuflim.
#[pymodule]
fn ptuflim(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(read_ptu, m)?)?;
    m.add_function(wrap_pyfunction!(read_header, m)?)?;
    m.add_function(wrap_pyfunction!(decode_events, m)?)?;
    m.add_function(wrap_pyfunction!(phasor_components, m)?)?;
    m.add_function(wrap_pyfunction!(time_mask, m)?)?;
    m.add_function(wrap_pyfunction!(median_filter, m)?)?;
    m.add_function(wrap_pyfunction!(fast_flim, m)?)?;
    m.add_function(wrap_pyfunction!(lifetime_to_phasor, m)?)?;
    m.add_function(wrap_pyfunction!(phasor_to_lifetime, m)?)?;
    Ok(())
}
