//! EMD (HDF5) container I/O.
//!
//! A fresh container carries root attributes `version_major = 0` and
//! `version_minor = 2` and the top-level groups `data`, `microscope`,
//! `sample`, `user` and `comments`. Each data group holds a `data` dataset,
//! one `dimN` vector per axis with `name`/`units` attributes, and is tagged
//! with `emd_group_type = 1`. Comments are string attributes on `comments`
//! keyed by their local creation time.

use crate::{Error, Result};
use emdconv_core::{ComplexF32, ComplexF64, DimensionVector, ElementType, TypedArray};
use hdf5::types::{FloatSize, IntSize, TypeDescriptor, VarLenUnicode};
use hdf5::{Dataset, File, Group, H5Type, Location};
use ndarray::{Array1, ArrayD, Dimension};
use std::fs;
use std::path::Path;
use std::str::FromStr;

const VERSION_MAJOR: i32 = 0;
const VERSION_MINOR: i32 = 2;
const TOP_LEVEL_GROUPS: [&str; 5] = ["data", "microscope", "sample", "user", "comments"];
const DATA_DATASET: &str = "data";
const GROUP_TYPE_ATTR: &str = "emd_group_type";
const COMMENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `complex64` as stored in the container.
#[derive(H5Type, Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct H5Complex64 {
    pub r: f32,
    pub i: f32,
}

/// `complex128` as stored in the container.
#[derive(H5Type, Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct H5Complex128 {
    pub r: f64,
    pub i: f64,
}

impl From<ComplexF32> for H5Complex64 {
    fn from(value: ComplexF32) -> Self {
        Self {
            r: value.re,
            i: value.im,
        }
    }
}

impl From<ComplexF64> for H5Complex128 {
    fn from(value: ComplexF64) -> Self {
        Self {
            r: value.re,
            i: value.im,
        }
    }
}

/// An open EMD container.
pub struct EmdFile {
    file: File,
}

impl EmdFile {
    /// Creates an empty container, removing any file already at `path`.
    ///
    /// # Errors
    /// Returns an error if the old file cannot be removed or HDF5 fails.
    pub fn create_fresh<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            log::warn!("removing existing output {}", path.display());
            fs::remove_file(path)?;
        }

        let file = File::create(path)?;
        file.new_attr::<i32>()
            .create("version_major")?
            .write_scalar(&VERSION_MAJOR)?;
        file.new_attr::<i32>()
            .create("version_minor")?
            .write_scalar(&VERSION_MINOR)?;
        for name in TOP_LEVEL_GROUPS {
            file.create_group(name)?;
        }
        Ok(Self { file })
    }

    /// Opens an existing container read-only.
    ///
    /// # Errors
    /// Returns an error if the file is not an EMD container.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        if file.group("data").is_err() {
            return Err(Error::InvalidFormat(
                "container has no top-level data group".to_string(),
            ));
        }
        Ok(Self { file })
    }

    /// `(version_major, version_minor)`.
    ///
    /// # Errors
    /// Returns an error if the version attributes are missing.
    pub fn version(&self) -> Result<(i32, i32)> {
        Ok((
            self.file.attr("version_major")?.read_scalar()?,
            self.file.attr("version_minor")?.read_scalar()?,
        ))
    }

    /// Creates data group `data/<name>`.
    ///
    /// # Errors
    /// Returns an error if the group exists or cannot be created.
    pub fn create_data_group(&self, name: &str) -> Result<DataGroup> {
        let group = self.file.group("data")?.create_group(name)?;
        group
            .new_attr::<i32>()
            .create(GROUP_TYPE_ATTR)?
            .write_scalar(&1)?;
        Ok(DataGroup { group })
    }

    /// Opens data group `data/<name>`.
    ///
    /// # Errors
    /// Returns an error if the group does not exist.
    pub fn data_group(&self, name: &str) -> Result<DataGroup> {
        let group = self.file.group("data")?.group(name)?;
        Ok(DataGroup { group })
    }

    /// Names of all data groups.
    ///
    /// # Errors
    /// Returns an error if HDF5 I/O fails.
    pub fn group_names(&self) -> Result<Vec<String>> {
        Ok(self.file.group("data")?.member_names()?)
    }

    /// Appends a comment keyed by the current local time and returns the key.
    ///
    /// # Errors
    /// Returns an error if HDF5 I/O fails.
    pub fn put_comment(&self, text: &str) -> Result<String> {
        let comments = self.file.group("comments")?;
        let existing = comments.attr_names()?;
        let stamp = chrono::Local::now().format(COMMENT_TIME_FORMAT).to_string();

        let mut key = stamp.clone();
        let mut counter = 1;
        while existing.contains(&key) {
            key = format!("{stamp} ({counter})");
            counter += 1;
        }
        set_attr_str(&comments, &key, text)?;
        Ok(key)
    }

    /// All comments as `(timestamp, text)`, sorted by key.
    ///
    /// # Errors
    /// Returns an error if HDF5 I/O fails.
    pub fn comments(&self) -> Result<Vec<(String, String)>> {
        let comments = self.file.group("comments")?;
        let mut keys = comments.attr_names()?;
        keys.sort();
        keys.into_iter()
            .map(|key| {
                let text = read_attr_str(&comments, &key)?;
                Ok((key, text))
            })
            .collect()
    }

    /// Flushes and closes the file.
    ///
    /// # Errors
    /// Returns an error if HDF5 cannot close the file.
    pub fn close(self) -> Result<()> {
        Ok(self.file.close()?)
    }
}

/// A data group inside `data`.
pub struct DataGroup {
    group: Group,
}

impl DataGroup {
    /// Full HDF5 path of the group.
    #[must_use]
    pub fn name(&self) -> String {
        self.group.name()
    }

    /// Value of `emd_group_type`.
    ///
    /// # Errors
    /// Returns an error if the attribute is missing.
    pub fn group_type(&self) -> Result<i32> {
        Ok(self.group.attr(GROUP_TYPE_ATTR)?.read_scalar()?)
    }

    /// Creates the `data` dataset with its final shape and element type.
    ///
    /// # Errors
    /// Returns an error if HDF5 cannot create the dataset.
    pub fn allocate_data(
        &self,
        element_type: ElementType,
        shape: &[usize],
    ) -> Result<AllocatedDataset> {
        let dataset = create_typed_dataset(&self.group, DATA_DATASET, element_type, shape)?;
        log::debug!(
            "allocated {}/{DATA_DATASET}: {shape:?} {element_type}",
            self.group.name()
        );
        Ok(AllocatedDataset {
            dataset,
            element_type,
            shape: shape.to_vec(),
        })
    }

    /// Creates and fills the `data` dataset in one step.
    ///
    /// # Errors
    /// Returns an error if HDF5 I/O fails.
    pub fn write_data<D: Dimension>(&self, data: &TypedArray<D>) -> Result<()> {
        self.allocate_data(data.element_type(), data.shape())?
            .write_all(data)
    }

    /// Writes dimension vector `dim<axis>` (1-based).
    ///
    /// # Errors
    /// Returns an error if HDF5 I/O fails.
    pub fn write_dim(&self, axis: usize, dim: &DimensionVector) -> Result<()> {
        let name = format!("dim{axis}");
        let dataset = self
            .group
            .new_dataset::<f64>()
            .shape(dim.len())
            .create(name.as_str())?;
        dataset.write(dim.values.view())?;
        set_attr_str(&dataset, "name", &dim.name)?;
        set_attr_str(&dataset, "units", &dim.units)?;
        Ok(())
    }

    /// Reads dimension vector `dim<axis>` (1-based).
    ///
    /// # Errors
    /// Returns an error if the vector or its attributes are missing.
    pub fn read_dim(&self, axis: usize) -> Result<DimensionVector> {
        let dataset = self.group.dataset(&format!("dim{axis}"))?;
        let values = Array1::from(dataset.read_raw::<f64>()?);
        Ok(DimensionVector::new(
            values,
            read_attr_str(&dataset, "name")?,
            read_attr_str(&dataset, "units")?,
        ))
    }

    /// Shape of the `data` dataset.
    ///
    /// # Errors
    /// Returns an error if the dataset is missing.
    pub fn data_shape(&self) -> Result<Vec<usize>> {
        Ok(self.group.dataset(DATA_DATASET)?.shape())
    }

    /// Element type of the `data` dataset.
    ///
    /// # Errors
    /// Returns [`Error::InvalidFormat`] for types the converter never writes.
    pub fn data_element_type(&self) -> Result<ElementType> {
        let descriptor = self.group.dataset(DATA_DATASET)?.dtype()?.to_descriptor()?;
        element_type_of(&descriptor)
            .ok_or_else(|| Error::InvalidFormat(format!("unsupported dataset type {descriptor:?}")))
    }

    /// Reads the `data` dataset.
    ///
    /// # Errors
    /// Returns an error if `T` does not match the stored type.
    pub fn read_data<T: H5Type>(&self) -> Result<ArrayD<T>> {
        Ok(self.group.dataset(DATA_DATASET)?.read_dyn::<T>()?)
    }
}

/// A created but not yet written `data` dataset.
pub struct AllocatedDataset {
    dataset: Dataset,
    element_type: ElementType,
    shape: Vec<usize>,
}

impl AllocatedDataset {
    #[must_use]
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Writes the whole payload in one call.
    ///
    /// # Errors
    /// Returns a core `TypeMismatch`/`ShapeMismatch` error if `data` does not
    /// match the allocation, or an HDF5 error.
    pub fn write_all<D: Dimension>(&self, data: &TypedArray<D>) -> Result<()> {
        if data.element_type() != self.element_type {
            return Err(emdconv_core::Error::TypeMismatch {
                expected: self.element_type,
                actual: data.element_type(),
            }
            .into());
        }
        if data.shape() != self.shape.as_slice() {
            return Err(emdconv_core::Error::ShapeMismatch {
                expected: self.shape.clone(),
                actual: data.shape().to_vec(),
            }
            .into());
        }

        let dataset = &self.dataset;
        match data {
            TypedArray::UInt8(arr) => dataset.write(arr.view())?,
            TypedArray::UInt16(arr) => dataset.write(arr.view())?,
            TypedArray::UInt32(arr) => dataset.write(arr.view())?,
            TypedArray::UInt64(arr) => dataset.write(arr.view())?,
            TypedArray::Int8(arr) => dataset.write(arr.view())?,
            TypedArray::Int16(arr) => dataset.write(arr.view())?,
            TypedArray::Int32(arr) => dataset.write(arr.view())?,
            TypedArray::Int64(arr) => dataset.write(arr.view())?,
            TypedArray::Float32(arr) => dataset.write(arr.view())?,
            TypedArray::Float64(arr) => dataset.write(arr.view())?,
            TypedArray::Complex64(arr) => dataset.write(arr.mapv(H5Complex64::from).view())?,
            TypedArray::Complex128(arr) => dataset.write(arr.mapv(H5Complex128::from).view())?,
        }
        Ok(())
    }
}

fn create_typed_dataset(
    group: &Group,
    name: &str,
    element_type: ElementType,
    shape: &[usize],
) -> Result<Dataset> {
    let extents = shape.to_vec();
    let dataset = match element_type {
        ElementType::UInt8 => group.new_dataset::<u8>().shape(extents).create(name)?,
        ElementType::UInt16 => group.new_dataset::<u16>().shape(extents).create(name)?,
        ElementType::UInt32 => group.new_dataset::<u32>().shape(extents).create(name)?,
        ElementType::UInt64 => group.new_dataset::<u64>().shape(extents).create(name)?,
        ElementType::Int8 => group.new_dataset::<i8>().shape(extents).create(name)?,
        ElementType::Int16 => group.new_dataset::<i16>().shape(extents).create(name)?,
        ElementType::Int32 => group.new_dataset::<i32>().shape(extents).create(name)?,
        ElementType::Int64 => group.new_dataset::<i64>().shape(extents).create(name)?,
        ElementType::Float32 => group.new_dataset::<f32>().shape(extents).create(name)?,
        ElementType::Float64 => group.new_dataset::<f64>().shape(extents).create(name)?,
        ElementType::Complex64 => group
            .new_dataset::<H5Complex64>()
            .shape(extents)
            .create(name)?,
        ElementType::Complex128 => group
            .new_dataset::<H5Complex128>()
            .shape(extents)
            .create(name)?,
    };
    Ok(dataset)
}

fn element_type_of(descriptor: &TypeDescriptor) -> Option<ElementType> {
    Some(match descriptor {
        TypeDescriptor::Unsigned(IntSize::U1) => ElementType::UInt8,
        TypeDescriptor::Unsigned(IntSize::U2) => ElementType::UInt16,
        TypeDescriptor::Unsigned(IntSize::U4) => ElementType::UInt32,
        TypeDescriptor::Unsigned(IntSize::U8) => ElementType::UInt64,
        TypeDescriptor::Integer(IntSize::U1) => ElementType::Int8,
        TypeDescriptor::Integer(IntSize::U2) => ElementType::Int16,
        TypeDescriptor::Integer(IntSize::U4) => ElementType::Int32,
        TypeDescriptor::Integer(IntSize::U8) => ElementType::Int64,
        TypeDescriptor::Float(FloatSize::U4) => ElementType::Float32,
        TypeDescriptor::Float(FloatSize::U8) => ElementType::Float64,
        TypeDescriptor::Compound(compound) if compound.fields.len() == 2 => {
            match compound.fields[0].ty {
                TypeDescriptor::Float(FloatSize::U4) => ElementType::Complex64,
                TypeDescriptor::Float(FloatSize::U8) => ElementType::Complex128,
                _ => return None,
            }
        }
        _ => return None,
    })
}

fn set_attr_str(location: &Location, name: &str, value: &str) -> Result<()> {
    let value = to_var_len_unicode(value)?;
    location
        .new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn read_attr_str(location: &Location, name: &str) -> Result<String> {
    let value: VarLenUnicode = location.attr(name)?.read_scalar()?;
    Ok(value.to_string())
}

fn to_var_len_unicode(value: &str) -> Result<VarLenUnicode> {
    VarLenUnicode::from_str(value)
        .map_err(|e| Error::InvalidFormat(format!("invalid utf-8 attribute: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use emdconv_core::{PixelData, StackData};
    use ndarray::{array, Array3};
    use tempfile::tempdir;

    #[test]
    fn test_fresh_container_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.emd");
        let emd = EmdFile::create_fresh(&path).unwrap();
        emd.create_data_group("frame.tif").unwrap();
        emd.close().unwrap();

        let emd = EmdFile::open(&path).unwrap();
        assert_eq!(emd.version().unwrap(), (0, 2));
        assert_eq!(emd.group_names().unwrap(), vec!["frame.tif".to_string()]);
        assert_eq!(emd.data_group("frame.tif").unwrap().group_type().unwrap(), 1);
    }

    #[test]
    fn test_create_fresh_replaces_existing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.emd");
        fs::write(&path, b"stale contents").unwrap();

        let emd = EmdFile::create_fresh(&path).unwrap();
        assert!(emd.group_names().unwrap().is_empty());
    }

    #[test]
    fn test_image_and_dims() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.emd");
        let emd = EmdFile::create_fresh(&path).unwrap();
        let group = emd.create_data_group("img").unwrap();

        group
            .write_data(&PixelData::Int16(array![[1, -2, 3], [4, 5, -6]]))
            .unwrap();
        group
            .write_dim(1, &DimensionVector::new(array![0.0, 1.0], "y", "pixel"))
            .unwrap();
        emd.close().unwrap();

        let emd = EmdFile::open(&path).unwrap();
        let group = emd.data_group("img").unwrap();
        assert_eq!(group.data_shape().unwrap(), vec![2, 3]);
        assert_eq!(group.data_element_type().unwrap(), ElementType::Int16);
        let data = group.read_data::<i16>().unwrap();
        assert_eq!(data[[1, 2]], -6);

        let dim = group.read_dim(1).unwrap();
        assert_eq!(dim.name, "y");
        assert_eq!(dim.units, "pixel");
        assert_eq!(dim.values, array![0.0, 1.0]);
    }

    #[test]
    fn test_complex_payload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.emd");
        let emd = EmdFile::create_fresh(&path).unwrap();
        let group = emd.create_data_group("cplx").unwrap();
        group
            .write_data(&PixelData::Complex128(array![[ComplexF64::new(1.0, -2.0)]]))
            .unwrap();

        assert_eq!(group.data_element_type().unwrap(), ElementType::Complex128);
        let data = group.read_data::<H5Complex128>().unwrap();
        assert_eq!(data[[0, 0]], H5Complex128 { r: 1.0, i: -2.0 });
    }

    #[test]
    fn test_allocated_dataset_checks() {
        let dir = tempdir().unwrap();
        let emd = EmdFile::create_fresh(dir.path().join("out.emd")).unwrap();
        let group = emd.create_data_group("stack").unwrap();
        let slot = group.allocate_data(ElementType::Float64, &[2, 2, 2]).unwrap();

        let wrong_type = StackData::UInt8(Array3::zeros((2, 2, 2)));
        assert!(matches!(
            slot.write_all(&wrong_type),
            Err(Error::CoreError(emdconv_core::Error::TypeMismatch { .. }))
        ));
        let wrong_shape = StackData::Float64(Array3::zeros((1, 2, 2)));
        assert!(matches!(
            slot.write_all(&wrong_shape),
            Err(Error::CoreError(emdconv_core::Error::ShapeMismatch { .. }))
        ));
        slot.write_all(&StackData::Float64(Array3::ones((2, 2, 2))))
            .unwrap();
    }

    #[test]
    fn test_comment_keys_unique() {
        let dir = tempdir().unwrap();
        let emd = EmdFile::create_fresh(dir.path().join("out.emd")).unwrap();
        let first = emd.put_comment("first").unwrap();
        let second = emd.put_comment("second").unwrap();
        assert_ne!(first, second);

        let comments = emd.comments().unwrap();
        assert_eq!(comments.len(), 2);
        let texts: Vec<&str> = comments.iter().map(|(_, text)| text.as_str()).collect();
        assert!(texts.contains(&"first"));
        assert!(texts.contains(&"second"));
    }
}
