//! Python bindings using PyO3.
//!
//! This module exposes address handling and the firewall listing parser to
//! Python. Store access stays on the Rust side.

use pyo3::exceptions::{PyKeyError, PyOSError, PyPermissionError, PyValueError};
use pyo3::prelude::*;
use std::collections::BTreeMap;

use crate::{parse_rules as rust_parse_rules, Address as RustAddress, RegistryError};

/// Convert Rust RegistryError to Python exception
fn registry_error_to_py(err: RegistryError) -> PyErr {
    match err {
        RegistryError::NotFound(msg) => PyKeyError::new_err(msg),
        RegistryError::AccessDenied(msg) => PyPermissionError::new_err(msg),
        RegistryError::MalformedAddress(msg) => PyValueError::new_err(format!("Malformed address: {}", msg)),
        RegistryError::InvalidUtf16 { .. } | RegistryError::TruncatedData { .. } => {
            PyValueError::new_err(err.to_string())
        }
        RegistryError::AccessError { .. }
        | RegistryError::Io(_)
        | RegistryError::CommandFailed { .. } => PyOSError::new_err(err.to_string()),
    }
}

/// Python wrapper for Address
#[pyclass(name = "Address", frozen)]
#[derive(Clone)]
pub struct PyAddress {
    inner: RustAddress,
}

#[pymethods]
impl PyAddress {
    #[new]
    fn new(text: &str) -> PyResult<Self> {
        Self::parse(text)
    }

    /// Parse an address such as `HKLM\Software\Vendor`
    #[staticmethod]
    fn parse(text: &str) -> PyResult<Self> {
        RustAddress::parse(text)
            .map(|inner| PyAddress { inner })
            .map_err(registry_error_to_py)
    }

    /// Append text (split on backslashes) to this address
    fn compose(&self, tail: &str) -> PyResult<Self> {
        self.inner
            .compose(tail)
            .map(|inner| PyAddress { inner })
            .map_err(registry_error_to_py)
    }

    /// Display name of the last segment
    #[getter]
    fn name(&self) -> String {
        self.inner.name()
    }

    /// Long root name, or None for relative addresses
    #[getter]
    fn root(&self) -> Option<&'static str> {
        self.inner.root().map(|root| root.name())
    }

    /// Segments of this address
    #[getter]
    fn segments(&self) -> Vec<String> {
        self.inner.segments().to_vec()
    }

    /// Parent address, or None for a single segment
    fn parent(&self) -> Option<Self> {
        self.inner.parent().map(|inner| PyAddress { inner })
    }

    /// Address with the root segment removed
    fn relative(&self) -> Option<Self> {
        self.inner.relative_to_root().map(|inner| PyAddress { inner })
    }

    fn is_absolute(&self) -> bool {
        self.inner.is_absolute()
    }

    fn __len__(&self) -> usize {
        self.inner.segment_count()
    }

    fn __str__(&self) -> String {
        self.inner.to_string()
    }

    fn __repr__(&self) -> String {
        format!("Address('{}')", self.inner)
    }
}

/// Parse `netsh advfirewall firewall show rule verbose` output lines
#[pyfunction]
fn parse_rules(lines: Vec<String>) -> Vec<BTreeMap<String, String>> {
    rust_parse_rules(lines)
        .into_iter()
        .map(|rule| rule.into_map())
        .collect()
}

/// Python module definition
#[pymodule]
fn reg_sweep(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyAddress>()?;
    m.add_function(wrap_pyfunction!(parse_rules, m)?)?;

    // Add version constant
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
