//! In-memory gridded dataset.
//!
//! A [`Dataset`] holds lat/lon (and optionally time) coordinates, a set of
//! data variables over `(time, lat, lon)` and free-form attributes. It is
//! what the NetCDF layer reads and writes and what the subsetter masks and
//! trims. Missing values are `NaN`.
//!
//! Variables without a time dimension are stored with a time extent of one
//! and `has_time == false`. Values are held as `f64` whatever their type
//! on disk; [`DataType`] records the type to write back.
//!
//! Variables that are not on the grid (bounds, grid mappings, station
//! tables) are kept as [`AuxVariable`]s and carried through unmasked.

use std::collections::BTreeMap;

use ndarray::{Array2, Array3, ArrayD, ArrayView2, Axis};

use crate::error::MaskError;
use crate::grid::GridAxes;

/// Name of the global provenance attribute.
pub const HISTORY_ATTR: &str = "history";

/// Attribute value kept independent of any file format.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Text attribute
    Text(String),
    /// Scalar numeric attribute
    Number(f64),
    /// Numeric array attribute
    Numbers(Vec<f64>),
}

impl AttrValue {
    /// Text content, if this is a text attribute.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Scalar value, if this is a numeric attribute.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Number(v) => Some(*v),
            AttrValue::Numbers(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Number(v)
    }
}

/// Attribute map, ordered by name.
pub type Attributes = BTreeMap<String, AttrValue>;

/// Element type of a variable in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataType {
    /// Signed 8-bit integer
    Byte,
    /// Unsigned 8-bit integer
    UByte,
    /// Signed 16-bit integer
    Short,
    /// Unsigned 16-bit integer
    UShort,
    /// Signed 32-bit integer
    Int,
    /// Unsigned 32-bit integer
    UInt,
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 64-bit integer
    UInt64,
    /// 32-bit float
    Float,
    /// 64-bit float
    #[default]
    Double,
}

impl DataType {
    /// True for floating point types, which can hold `NaN`.
    pub fn is_float(self) -> bool {
        matches!(self, DataType::Float | DataType::Double)
    }
}

/// A 1-D coordinate variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinate {
    /// Dimension and variable name
    pub name: String,
    /// Coordinate values
    pub values: Vec<f64>,
    /// Variable attributes (units, standard_name, ...)
    pub attributes: Attributes,
}

impl Coordinate {
    /// Create a coordinate without attributes.
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
            attributes: Attributes::new(),
        }
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the coordinate has no points.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Coordinate restricted to the given indices.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            name: self.name.clone(),
            values: indices.iter().map(|&i| self.values[i]).collect(),
            attributes: self.attributes.clone(),
        }
    }
}

/// A gridded data variable over `(time, lat, lon)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Variable name
    pub name: String,
    /// Values indexed `[time, lat, lon]`, `NaN` where missing
    pub data: Array3<f64>,
    /// False for purely spatial variables (time extent is then 1)
    pub has_time: bool,
    /// Element type written to file (`Float` or `Double`)
    pub dtype: DataType,
    /// Variable attributes
    pub attributes: Attributes,
}

impl Variable {
    /// Create a time-varying variable.
    pub fn new(name: impl Into<String>, data: Array3<f64>) -> Self {
        Self {
            name: name.into(),
            data,
            has_time: true,
            dtype: DataType::Double,
            attributes: Attributes::new(),
        }
    }

    /// Create a purely spatial variable.
    pub fn spatial(name: impl Into<String>, data: Array2<f64>) -> Self {
        Self {
            name: name.into(),
            data: data.insert_axis(Axis(0)),
            has_time: false,
            dtype: DataType::Double,
            attributes: Attributes::new(),
        }
    }

    /// Set the element type written to file.
    ///
    /// Integer types cannot hold missing values, so grid variables are
    /// always written as floats.
    pub fn with_dtype(mut self, dtype: DataType) -> Self {
        self.dtype = if dtype.is_float() { dtype } else { DataType::Float };
        self
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Spatial shape as (n_lat, n_lon).
    pub fn spatial_shape(&self) -> (usize, usize) {
        let (_, n_lat, n_lon) = self.data.dim();
        (n_lat, n_lon)
    }

    /// First time slice (the whole field for spatial variables).
    pub fn first_slice(&self) -> ArrayView2<'_, f64> {
        self.data.index_axis(Axis(0), 0)
    }

    /// Variable restricted to the given lat and lon indices.
    pub fn select(&self, lat_idx: &[usize], lon_idx: &[usize]) -> Self {
        let data = self
            .data
            .select(Axis(1), lat_idx)
            .select(Axis(2), lon_idx);
        Self {
            name: self.name.clone(),
            data,
            has_time: self.has_time,
            dtype: self.dtype,
            attributes: self.attributes.clone(),
        }
    }
}

/// A variable off the `(time, lat, lon)` grid, stored as read.
///
/// Axes named after the lat or lon dimension follow the grid when it is
/// trimmed; everything else passes through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct AuxVariable {
    /// Variable name
    pub name: String,
    /// Dimension names, one per axis of `data`
    pub dims: Vec<String>,
    /// Raw values (no unpacking or fill handling)
    pub data: ArrayD<f64>,
    /// Element type in the file
    pub dtype: DataType,
    /// Variable attributes, packing attributes included
    pub attributes: Attributes,
}

impl AuxVariable {
    /// Create an auxiliary variable of type `Double`.
    pub fn new(name: impl Into<String>, dims: Vec<String>, data: ArrayD<f64>) -> Self {
        Self {
            name: name.into(),
            dims,
            data,
            dtype: DataType::Double,
            attributes: Attributes::new(),
        }
    }

    /// Set the element type.
    pub fn with_dtype(mut self, dtype: DataType) -> Self {
        self.dtype = dtype;
        self
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Length of the axis named `dim`, if the variable has one.
    pub fn dim_len(&self, dim: &str) -> Option<usize> {
        self.dims
            .iter()
            .position(|d| d == dim)
            .map(|axis| self.data.len_of(Axis(axis)))
    }

    /// Re-slice every axis named `lat_dim` or `lon_dim`.
    pub fn select(
        &self,
        lat_dim: &str,
        lat_idx: &[usize],
        lon_dim: &str,
        lon_idx: &[usize],
    ) -> Self {
        let mut data = self.data.clone();
        for (axis, dim) in self.dims.iter().enumerate() {
            if dim == lat_dim {
                data = data.select(Axis(axis), lat_idx);
            } else if dim == lon_dim {
                data = data.select(Axis(axis), lon_idx);
            }
        }
        Self {
            data,
            ..self.clone()
        }
    }
}

/// Names of the latitude, longitude and time dimensions in a file.
///
/// Each dimension is expected to have a coordinate variable of the same
/// name. Defaults to `lat`, `lon` and `time`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisNames {
    /// Latitude dimension (and coordinate variable) name
    pub lat: String,
    /// Longitude dimension (and coordinate variable) name
    pub lon: String,
    /// Time dimension (and coordinate variable) name
    pub time: String,
}

impl Default for AxisNames {
    fn default() -> Self {
        Self {
            lat: "lat".to_string(),
            lon: "lon".to_string(),
            time: "time".to_string(),
        }
    }
}

impl AxisNames {
    /// Set the latitude dimension name.
    pub fn with_lat(mut self, name: impl Into<String>) -> Self {
        self.lat = name.into();
        self
    }

    /// Set the longitude dimension name.
    pub fn with_lon(mut self, name: impl Into<String>) -> Self {
        self.lon = name.into();
        self
    }

    /// Set the time dimension name.
    pub fn with_time(mut self, name: impl Into<String>) -> Self {
        self.time = name.into();
        self
    }
}

/// Gridded dataset: coordinates, variables and global attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Latitude coordinate
    pub lat: Coordinate,
    /// Longitude coordinate
    pub lon: Coordinate,
    /// Time coordinate, if any variable is time-varying
    pub time: Option<Coordinate>,
    /// Data variables in file order
    pub variables: Vec<Variable>,
    /// Off-grid variables carried through unchanged
    pub auxiliary: Vec<AuxVariable>,
    /// Global attributes
    pub attributes: Attributes,
}

impl Dataset {
    /// Create an empty dataset on the given grid.
    pub fn new(lat: Coordinate, lon: Coordinate) -> Self {
        Self {
            lat,
            lon,
            time: None,
            variables: Vec::new(),
            auxiliary: Vec::new(),
            attributes: Attributes::new(),
        }
    }

    /// Set the time coordinate.
    pub fn with_time(mut self, time: Coordinate) -> Self {
        self.time = Some(time);
        self
    }

    /// Add a variable, checking its shape against the coordinates.
    pub fn add_variable(&mut self, variable: Variable) -> Result<(), MaskError> {
        let (n_t, n_lat, n_lon) = variable.data.dim();
        let expected_t = if variable.has_time {
            self.time.as_ref().map_or(n_t, Coordinate::len)
        } else {
            1
        };

        if (n_t, n_lat, n_lon) != (expected_t, self.lat.len(), self.lon.len()) {
            return Err(MaskError::ShapeMismatch {
                what: format!("variable {}", variable.name),
                expected: vec![expected_t, self.lat.len(), self.lon.len()],
                actual: vec![n_t, n_lat, n_lon],
            });
        }

        self.variables.push(variable);
        Ok(())
    }

    /// Builder form of [`Dataset::add_variable`].
    pub fn with_variable(mut self, variable: Variable) -> Result<Self, MaskError> {
        self.add_variable(variable)?;
        Ok(self)
    }

    /// Add an off-grid variable, checking any lat/lon axes.
    pub fn add_auxiliary(&mut self, aux: AuxVariable) -> Result<(), MaskError> {
        let grid_axes = [
            (&self.lat.name, self.lat.len()),
            (&self.lon.name, self.lon.len()),
        ];
        for (dim, expected) in grid_axes {
            if let Some(len) = aux.dim_len(dim) {
                if len != expected {
                    return Err(MaskError::ShapeMismatch {
                        what: format!("{} axis of {}", dim, aux.name),
                        expected: vec![expected],
                        actual: vec![len],
                    });
                }
            }
        }
        self.auxiliary.push(aux);
        Ok(())
    }

    /// Builder form of [`Dataset::add_auxiliary`].
    pub fn with_auxiliary(mut self, aux: AuxVariable) -> Result<Self, MaskError> {
        self.add_auxiliary(aux)?;
        Ok(self)
    }

    /// Look up an off-grid variable by name.
    pub fn auxiliary(&self, name: &str) -> Option<&AuxVariable> {
        self.auxiliary.iter().find(|v| v.name == name)
    }

    /// Look up a variable by name.
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Look up a variable by name, mutably.
    pub fn variable_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables.iter_mut().find(|v| v.name == name)
    }

    /// Names of all data variables.
    pub fn variable_names(&self) -> Vec<String> {
        self.variables.iter().map(|v| v.name.clone()).collect()
    }

    /// Resolve a variable selection; an empty selection means every variable.
    pub fn resolve_selection(&self, selection: &[String]) -> Result<Vec<String>, MaskError> {
        if selection.is_empty() {
            return Ok(self.variable_names());
        }
        for name in selection {
            if self.variable(name).is_none() {
                return Err(MaskError::MissingVariable(name.clone()));
            }
        }
        Ok(selection.to_vec())
    }

    /// Current `history` attribute.
    pub fn history(&self) -> Option<&str> {
        self.attributes.get(HISTORY_ATTR).and_then(AttrValue::as_text)
    }

    /// Replace the `history` attribute.
    pub fn set_history(&mut self, history: impl Into<String>) {
        self.attributes
            .insert(HISTORY_ATTR.to_string(), AttrValue::Text(history.into()));
    }

    /// Dataset restricted to the given lat and lon indices.
    pub fn select(&self, lat_idx: &[usize], lon_idx: &[usize]) -> Self {
        Self {
            lat: self.lat.select(lat_idx),
            lon: self.lon.select(lon_idx),
            time: self.time.clone(),
            variables: self
                .variables
                .iter()
                .map(|v| v.select(lat_idx, lon_idx))
                .collect(),
            auxiliary: self
                .auxiliary
                .iter()
                .map(|a| a.select(&self.lat.name, lat_idx, &self.lon.name, lon_idx))
                .collect(),
            attributes: self.attributes.clone(),
        }
    }
}

impl GridAxes for Dataset {
    fn lat(&self) -> &[f64] {
        &self.lat.values
    }

    fn lon(&self) -> &[f64] {
        &self.lon.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, IxDyn};

    fn sample() -> Dataset {
        let mut ds = Dataset::new(
            Coordinate::new("lat", vec![-30.0, -29.5, -29.0]),
            Coordinate::new("lon", vec![140.0, 140.5]),
        )
        .with_time(Coordinate::new("time", vec![0.0, 1.0]));

        let data = Array3::from_shape_fn((2, 3, 2), |(t, j, i)| (t * 100 + j * 10 + i) as f64);
        ds.add_variable(Variable::new("precip", data)).unwrap();
        ds
    }

    #[test]
    fn test_add_variable_checks_shape() {
        let mut ds = sample();
        let bad = Variable::new("bad", Array3::zeros((2, 2, 2)));
        assert!(matches!(ds.add_variable(bad), Err(MaskError::ShapeMismatch { .. })));

        let spatial = Variable::spatial("mask", Array2::zeros((3, 2)));
        assert!(ds.add_variable(spatial).is_ok());
        assert_eq!(ds.variable("mask").unwrap().data.dim(), (1, 3, 2));
    }

    #[test]
    fn test_select() {
        let ds = sample();
        let sub = ds.select(&[1, 2], &[1]);

        assert_eq!(sub.lat.values, vec![-29.5, -29.0]);
        assert_eq!(sub.lon.values, vec![140.5]);
        let v = sub.variable("precip").unwrap();
        assert_eq!(v.data.dim(), (2, 2, 1));
        assert_eq!(v.data[[1, 0, 0]], 111.0);
    }

    #[test]
    fn test_select_reslices_bounds() {
        let bounds = ArrayD::from_shape_fn(IxDyn(&[3, 2]), |ix| ix[0] as f64 * 10.0 + ix[1] as f64);
        let crs = ArrayD::from_elem(IxDyn(&[]), 4326.0);
        let ds = sample()
            .with_auxiliary(AuxVariable::new("lat_bnds", vec!["lat".into(), "nv".into()], bounds))
            .unwrap()
            .with_auxiliary(AuxVariable::new("crs", vec![], crs).with_dtype(DataType::Int))
            .unwrap();

        let sub = ds.select(&[1, 2], &[0]);
        let lat_bnds = sub.auxiliary("lat_bnds").unwrap();
        assert_eq!(lat_bnds.data.shape(), &[2, 2]);
        assert_eq!(lat_bnds.data[[0, 1]], 11.0);

        let crs = sub.auxiliary("crs").unwrap();
        assert_eq!(crs.dtype, DataType::Int);
        assert_eq!(crs.data.iter().copied().collect::<Vec<_>>(), vec![4326.0]);
    }

    #[test]
    fn test_auxiliary_checks_grid_axes() {
        let mut ds = sample();
        let dims = vec!["lon".to_string(), "nv".to_string()];
        let bad = AuxVariable::new("lon_bnds", dims, ArrayD::zeros(IxDyn(&[5, 2])));
        assert!(matches!(ds.add_auxiliary(bad), Err(MaskError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_grid_variables_stay_float() {
        let v = Variable::spatial("count", Array2::zeros((3, 2))).with_dtype(DataType::Int);
        assert_eq!(v.dtype, DataType::Float);
        let v = v.with_dtype(DataType::Double);
        assert_eq!(v.dtype, DataType::Double);
    }

    #[test]
    fn test_history() {
        let mut ds = sample();
        assert!(ds.history().is_none());
        ds.set_history("created");
        assert_eq!(ds.history(), Some("created"));
    }

    #[test]
    fn test_resolve_selection() {
        let ds = sample();
        assert_eq!(ds.resolve_selection(&[]).unwrap(), vec!["precip".to_string()]);
        assert!(matches!(
            ds.resolve_selection(&["tmax".to_string()]),
            Err(MaskError::MissingVariable(_))
        ));
    }

    #[test]
    fn test_axis_names() {
        let axes = AxisNames::default().with_lat("latitude").with_lon("longitude");
        assert_eq!(axes.lat, "latitude");
        assert_eq!(axes.lon, "longitude");
        assert_eq!(axes.time, "time");
    }

    #[test]
    fn test_grid_axes() {
        let ds = sample();
        assert_eq!(ds.shape(), (3, 2));
        assert_eq!(GridAxes::lat(&ds)[0], -30.0);
    }
}
