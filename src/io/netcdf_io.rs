//! NetCDF I/O for gridded datasets.
//!
//! Reads `(time, lat, lon)` and `(lat, lon)` variables into a [`Dataset`]
//! and writes a dataset back out with CF-style fill values. Each variable
//! keeps its element type: `double` stays `double`, other grid variables
//! are written as `float`.
//!
//! # Reading
//!
//! Dimension names are given explicitly through [`AxisNames`]; nothing is
//! renamed or guessed. Packed and flagged values are unpacked on read:
//!
//! - `_FillValue` / `missing_value` matches become `NaN`
//! - `scale_factor` and `add_offset` are applied
//! - values beyond `1e30` (default netCDF fill) become `NaN`
//!
//! Variables over any other dimensions (bounds, grid mappings, ...) are
//! read raw as [`AuxVariable`]s and written back unchanged, re-sliced
//! along lat/lon when the grid was trimmed. Only string and user-defined
//! types are skipped.
//!
//! # Writing
//!
//! Output goes to a temporary sibling file which is renamed into place
//! only once fully written, so a failed run leaves no partial file.
//!
//! # Example
//!
//! ```rust,ignore
//! use gridmask_rs::AxisNames;
//! use gridmask_rs::io::{DatasetReader, NetCDFWriterConfig, write_dataset};
//!
//! let ds = DatasetReader::new()
//!     .with_axes(AxisNames::default().with_lat("latitude"))
//!     .with_variables(vec!["precip".into()])
//!     .read("agcd_precip_2020.nc")?;
//!
//! write_dataset(&ds, &NetCDFWriterConfig::new("masked.nc"))?;
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ndarray::{Array3, ArrayD, Axis, IxDyn};
use netcdf::AttributeValue;
use netcdf::types::{FloatType, IntType, NcVariableType};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dataset::{
    AttrValue, Attributes, AuxVariable, AxisNames, Coordinate, DataType, Dataset, Variable,
};
use crate::error::MaskError;

/// Error type for NetCDF operations.
#[derive(Debug, Error)]
pub enum NetCDFError {
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// NetCDF library error
    #[error("NetCDF error: {0}")]
    NetCDF(#[from] netcdf::Error),

    /// Invalid data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Missing variable
    #[error("Missing variable: {0}")]
    MissingVariable(String),
}

/// Fill value for missing `float` data (CF-conventions standard).
pub const FILL_VALUE_F32: f32 = 9.96921e+36;

/// Fill value for missing `double` data (CF-conventions standard).
pub const FILL_VALUE_F64: f64 = 9.969209968386869e+36;

/// Attributes consumed while unpacking and not carried to the output.
const PACKING_ATTRS: [&str; 4] = ["_FillValue", "missing_value", "scale_factor", "add_offset"];

/// Check if a value is valid (not a default fill value).
#[inline]
pub fn is_valid(v: f64) -> bool {
    v.is_finite() && v.abs() < 1.0e+30
}

// ============================================================================
// Reader
// ============================================================================

/// Reader for gridded NetCDF files.
#[derive(Debug, Clone, Default)]
pub struct DatasetReader {
    axes: AxisNames,
    variables: Vec<String>,
}

/// How a variable's dimensions map onto the grid.
enum GridLayout {
    TimeLatLon,
    LatLon,
}

impl DatasetReader {
    /// Reader with default axis names that loads every grid variable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the dimension names.
    pub fn with_axes(mut self, axes: AxisNames) -> Self {
        self.axes = axes;
        self
    }

    /// Load only the named variables (all grid variables if empty).
    pub fn with_variables(mut self, variables: Vec<String>) -> Self {
        self.variables = variables;
        self
    }

    /// Read a dataset from `path`.
    pub fn read(&self, path: impl AsRef<Path>) -> Result<Dataset, MaskError> {
        let path = path.as_ref();
        info!("Reading {}", path.display());
        let file = netcdf::open(path).map_err(NetCDFError::from)?;

        let lat = read_coordinate(&file, &self.axes.lat)?
            .ok_or_else(|| MaskError::MissingCoordinate(self.axes.lat.clone()))?;
        let lon = read_coordinate(&file, &self.axes.lon)?
            .ok_or_else(|| MaskError::MissingCoordinate(self.axes.lon.clone()))?;

        let mut dataset = Dataset::new(lat, lon);
        if let Some(time) = read_coordinate(&file, &self.axes.time)? {
            dataset = dataset.with_time(time);
        } else if let Some(dim) = file.dimension(&self.axes.time) {
            let steps = (0..dim.len()).map(|t| t as f64).collect();
            dataset = dataset.with_time(Coordinate::new(self.axes.time.clone(), steps));
        }
        dataset.attributes = read_attributes(file.attributes());

        let coordinate_names = [&self.axes.lat, &self.axes.lon, &self.axes.time];
        for var in file.variables() {
            let name = var.name();
            if coordinate_names.iter().any(|c| **c == name) {
                continue;
            }
            if !self.variables.is_empty() && !self.variables.contains(&name) {
                continue;
            }
            let Some(dtype) = data_type(&var) else {
                warn!("Skipping {}: unsupported type {:?}", name, var.vartype());
                continue;
            };
            match self.layout(&var) {
                Some(layout) => dataset.add_variable(read_variable(&var, layout, dtype)?)?,
                None => {
                    debug!("Carrying {} through as an off-grid variable", name);
                    dataset.add_auxiliary(read_auxiliary(&var, dtype)?)?;
                }
            }
        }

        for name in &self.variables {
            if dataset.variable(name).is_none() {
                return Err(NetCDFError::MissingVariable(name.clone()).into());
            }
        }

        debug!(
            "Read {} grid and {} off-grid variable(s) on a {}x{} grid",
            dataset.variables.len(),
            dataset.auxiliary.len(),
            dataset.lat.len(),
            dataset.lon.len()
        );
        Ok(dataset)
    }

    fn layout(&self, var: &netcdf::Variable) -> Option<GridLayout> {
        let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
        let dims: Vec<&str> = dims.iter().map(String::as_str).collect();
        let lat = self.axes.lat.as_str();
        let lon = self.axes.lon.as_str();
        let time = self.axes.time.as_str();

        match dims.as_slice() {
            [t, y, x] if *t == time && *y == lat && *x == lon => Some(GridLayout::TimeLatLon),
            [y, x] if *y == lat && *x == lon => Some(GridLayout::LatLon),
            _ => None,
        }
    }
}

/// Element type of a numeric variable.
fn data_type(var: &netcdf::Variable) -> Option<DataType> {
    let dtype = match var.vartype() {
        NcVariableType::Int(IntType::I8) => DataType::Byte,
        NcVariableType::Int(IntType::U8) => DataType::UByte,
        NcVariableType::Int(IntType::I16) => DataType::Short,
        NcVariableType::Int(IntType::U16) => DataType::UShort,
        NcVariableType::Int(IntType::I32) => DataType::Int,
        NcVariableType::Int(IntType::U32) => DataType::UInt,
        NcVariableType::Int(IntType::I64) => DataType::Int64,
        NcVariableType::Int(IntType::U64) => DataType::UInt64,
        NcVariableType::Float(FloatType::F32) => DataType::Float,
        NcVariableType::Float(FloatType::F64) => DataType::Double,
        _ => return None,
    };
    Some(dtype)
}

/// Read a 1-D coordinate variable, if present.
fn read_coordinate(file: &netcdf::File, name: &str) -> Result<Option<Coordinate>, NetCDFError> {
    let Some(var) = file.variable(name) else {
        return Ok(None);
    };
    if var.dimensions().len() != 1 {
        return Err(NetCDFError::InvalidData(format!(
            "coordinate {name} has {} dimensions",
            var.dimensions().len()
        )));
    }

    let values: Vec<f64> = var.get_values(..)?;
    Ok(Some(Coordinate {
        name: name.to_string(),
        values,
        attributes: read_attributes(var.attributes()),
    }))
}

/// Read and unpack a grid variable.
fn read_variable(
    var: &netcdf::Variable,
    layout: GridLayout,
    dtype: DataType,
) -> Result<Variable, NetCDFError> {
    let name = var.name();
    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

    let scale = get_attr_f64(var, "scale_factor").unwrap_or(1.0);
    let offset = get_attr_f64(var, "add_offset").unwrap_or(0.0);
    let fill = get_attr_f64(var, "_FillValue");
    let missing = get_attr_f64(var, "missing_value");

    let raw: Vec<f64> = var.get_values(..)?;
    let values: Vec<f64> = raw
        .into_iter()
        .map(|v| {
            if fill == Some(v) || missing == Some(v) || !is_valid(v) {
                f64::NAN
            } else {
                v * scale + offset
            }
        })
        .collect();

    let mut attributes = read_attributes(var.attributes());
    for packing in PACKING_ATTRS {
        attributes.remove(packing);
    }

    let variable = match layout {
        GridLayout::TimeLatLon => {
            let data = Array3::from_shape_vec((shape[0], shape[1], shape[2]), values)
                .map_err(|e| NetCDFError::InvalidData(format!("{name}: {e}")))?;
            Variable::new(name, data)
        }
        GridLayout::LatLon => {
            let data = Array3::from_shape_vec((1, shape[0], shape[1]), values)
                .map_err(|e| NetCDFError::InvalidData(format!("{name}: {e}")))?;
            let mut v = Variable::new(name, data);
            v.has_time = false;
            v
        }
    };

    Ok(Variable {
        attributes,
        ..variable.with_dtype(dtype)
    })
}

/// Read an off-grid variable as stored.
fn read_auxiliary(var: &netcdf::Variable, dtype: DataType) -> Result<AuxVariable, NetCDFError> {
    let name = var.name();
    let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

    let values: Vec<f64> = if shape.contains(&0) {
        Vec::new()
    } else {
        var.get_values(..)?
    };
    let data = ArrayD::from_shape_vec(IxDyn(&shape), values)
        .map_err(|e| NetCDFError::InvalidData(format!("{name}: {e}")))?;

    Ok(AuxVariable {
        attributes: read_attributes(var.attributes()),
        ..AuxVariable::new(name, dims, data).with_dtype(dtype)
    })
}

/// Get a scalar numeric attribute as f64.
fn get_attr_f64(var: &netcdf::Variable, name: &str) -> Option<f64> {
    var.attribute_value(name)
        .and_then(|r| r.ok())
        .and_then(|v| attr_value(v).and_then(|a| a.as_number()))
}

fn read_attributes<'a>(attrs: impl Iterator<Item = netcdf::Attribute<'a>>) -> Attributes {
    let mut out = Attributes::new();
    for attr in attrs {
        match attr.value().ok().and_then(attr_value) {
            Some(value) => {
                out.insert(attr.name().to_string(), value);
            }
            None => debug!("Dropping attribute {} of unsupported type", attr.name()),
        }
    }
    out
}

/// Convert a NetCDF attribute value to the format-independent form.
fn attr_value(value: AttributeValue) -> Option<AttrValue> {
    let value = match value {
        AttributeValue::Str(s) => AttrValue::Text(s),
        AttributeValue::Double(d) => AttrValue::Number(d),
        AttributeValue::Float(f) => AttrValue::Number(f as f64),
        AttributeValue::Int(i) => AttrValue::Number(i as f64),
        AttributeValue::Short(s) => AttrValue::Number(s as f64),
        AttributeValue::Schar(c) => AttrValue::Number(c as f64),
        AttributeValue::Uchar(c) => AttrValue::Number(c as f64),
        AttributeValue::Longlong(l) => AttrValue::Number(l as f64),
        AttributeValue::Doubles(d) => AttrValue::Numbers(d),
        AttributeValue::Floats(f) => AttrValue::Numbers(f.into_iter().map(f64::from).collect()),
        AttributeValue::Ints(i) => AttrValue::Numbers(i.into_iter().map(f64::from).collect()),
        AttributeValue::Shorts(s) => AttrValue::Numbers(s.into_iter().map(f64::from).collect()),
        _ => return None,
    };
    Some(value)
}

fn nc_value(value: &AttrValue) -> AttributeValue {
    match value {
        AttrValue::Text(s) => AttributeValue::Str(s.clone()),
        AttrValue::Number(v) => AttributeValue::Double(*v),
        AttrValue::Numbers(v) => AttributeValue::Doubles(v.clone()),
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Configuration for NetCDF output.
#[derive(Debug, Clone)]
pub struct NetCDFWriterConfig {
    /// Output file path
    pub path: PathBuf,
}

impl NetCDFWriterConfig {
    /// Create a new configuration with the given output path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Temporary sibling path written before the final rename.
    pub fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.path.with_file_name(format!(".{name}.tmp"))
    }
}

/// Write `dataset` to `config.path`, replacing it only on success.
pub fn write_dataset(dataset: &Dataset, config: &NetCDFWriterConfig) -> Result<(), NetCDFError> {
    let tmp = config.temp_path();
    let result = write_file(&tmp, dataset)
        .and_then(|()| std::fs::rename(&tmp, &config.path).map_err(NetCDFError::from));

    if result.is_err() && tmp.exists() {
        if let Err(e) = std::fs::remove_file(&tmp) {
            warn!("Could not remove {}: {}", tmp.display(), e);
        }
    }
    if result.is_ok() {
        info!("Wrote {}", config.path.display());
    }
    result
}

fn write_file(path: &Path, dataset: &Dataset) -> Result<(), NetCDFError> {
    let mut file = netcdf::create(path)?;

    let n_time = dataset.time.as_ref().map(Coordinate::len).or_else(|| {
        dataset
            .variables
            .iter()
            .find(|v| v.has_time)
            .map(|v| v.data.len_of(Axis(0)))
    });
    let time_name = dataset
        .time
        .as_ref()
        .map_or_else(|| "time".to_string(), |t| t.name.clone());

    let mut dims: BTreeMap<String, usize> = BTreeMap::new();
    dims.insert(dataset.lat.name.clone(), dataset.lat.len());
    dims.insert(dataset.lon.name.clone(), dataset.lon.len());
    if let Some(n) = n_time {
        dims.insert(time_name.clone(), n);
    }
    for aux in &dataset.auxiliary {
        for (axis, dim) in aux.dims.iter().enumerate() {
            let len = aux.data.len_of(Axis(axis));
            let known = *dims.entry(dim.clone()).or_insert(len);
            if known != len {
                return Err(NetCDFError::InvalidData(format!(
                    "{}: dimension {} has length {} but {} elsewhere",
                    aux.name, dim, len, known
                )));
            }
        }
    }
    for (name, len) in &dims {
        file.add_dimension(name, *len)?;
    }

    let mut coordinates = vec![&dataset.lat, &dataset.lon];
    if let Some(time) = &dataset.time {
        coordinates.push(time);
    }
    for coord in coordinates {
        let mut var = file.add_variable::<f64>(&coord.name, &[coord.name.as_str()])?;
        for (name, value) in &coord.attributes {
            var.put_attribute(name, nc_value(value))?;
        }
        if !coord.values.is_empty() {
            var.put_values(&coord.values, ..)?;
        }
    }

    for variable in &dataset.variables {
        let lat = dataset.lat.name.as_str();
        let lon = dataset.lon.name.as_str();
        let dims: Vec<&str> = if variable.has_time {
            vec![time_name.as_str(), lat, lon]
        } else {
            vec![lat, lon]
        };
        write_grid_variable(&mut file, variable, &dims)?;
    }

    for aux in &dataset.auxiliary {
        write_auxiliary(&mut file, aux)?;
    }

    for (name, value) in &dataset.attributes {
        file.add_attribute(name, nc_value(value))?;
    }

    Ok(())
}

/// Write a grid variable as `float` or `double` with `NaN` mapped to the fill value.
fn write_grid_variable(
    file: &mut netcdf::FileMut,
    variable: &Variable,
    dims: &[&str],
) -> Result<(), NetCDFError> {
    macro_rules! put_grid {
        ($ty:ty, $fill:expr) => {{
            let mut var = file.add_variable::<$ty>(&variable.name, dims)?;
            var.put_attribute("_FillValue", $fill)?;
            for (name, value) in &variable.attributes {
                if !PACKING_ATTRS.contains(&name.as_str()) {
                    var.put_attribute(name, nc_value(value))?;
                }
            }
            let flat: Vec<$ty> = variable
                .data
                .iter()
                .map(|&v| if v.is_nan() { $fill } else { v as $ty })
                .collect();
            if !flat.is_empty() {
                var.put_values(&flat, ..)?;
            }
        }};
    }

    match variable.dtype {
        DataType::Double => put_grid!(f64, FILL_VALUE_F64),
        _ => put_grid!(f32, FILL_VALUE_F32),
    }
    Ok(())
}

/// Write an off-grid variable with its original element type.
fn write_auxiliary(file: &mut netcdf::FileMut, aux: &AuxVariable) -> Result<(), NetCDFError> {
    let dims: Vec<&str> = aux.dims.iter().map(String::as_str).collect();

    // _FillValue must match the variable type
    macro_rules! put_raw {
        ($ty:ty) => {{
            let mut var = file.add_variable::<$ty>(&aux.name, &dims)?;
            for (name, value) in &aux.attributes {
                match (name.as_str(), value.as_number()) {
                    ("_FillValue", Some(fill)) => var.put_attribute(name, fill as $ty)?,
                    _ => var.put_attribute(name, nc_value(value))?,
                };
            }
            let flat: Vec<$ty> = aux.data.iter().map(|&v| v as $ty).collect();
            if !flat.is_empty() {
                var.put_values(&flat, ..)?;
            }
        }};
    }

    match aux.dtype {
        DataType::Byte => put_raw!(i8),
        DataType::UByte => put_raw!(u8),
        DataType::Short => put_raw!(i16),
        DataType::UShort => put_raw!(u16),
        DataType::Int => put_raw!(i32),
        DataType::UInt => put_raw!(u32),
        DataType::Int64 => put_raw!(i64),
        DataType::UInt64 => put_raw!(u64),
        DataType::Float => put_raw!(f32),
        DataType::Double => put_raw!(f64),
    }
    Ok(())
}
