use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use byteorder::{ReadBytesExt, WriteBytesExt, LE};

use crate::{
    context::{AssetWriter, Context, DiagnosticKind, PayloadType},
    error::{Error, PackageFile},
    property::StructType,
    tables::{FName, PackageTables},
    FString, Result,
};

/// Typed read access to a package blob.
pub trait ArchiveReader: Read + Seek + Sized {
    fn file(&self) -> PackageFile;
    fn tables(&self) -> &PackageTables;
    fn payload(&self, payload: PayloadType) -> Option<&[u8]>;
    fn log(&self) -> bool;
    /// Dotted property path of the value currently being read.
    fn path(&self) -> String;
    fn with_scope<F, T>(&mut self, name: &str, f: F) -> T
    where
        F: FnOnce(&mut Self) -> T;
    /// Struct type hint for the current path, or `default` with a diagnostic.
    fn struct_type_or(&mut self, default: &StructType) -> Result<StructType>;
    /// Record a recoverable issue at the current position.
    fn report(&mut self, kind: DiagnosticKind, message: String) -> Result<()>;

    fn position(&mut self) -> Result<u64> {
        Ok(self.stream_position()?)
    }
    fn skip(&mut self, count: i64) -> Result<()> {
        self.seek(SeekFrom::Current(count))?;
        Ok(())
    }
    fn read_fstring(&mut self) -> Result<FString> {
        crate::read_string(self)
    }
    /// 4 byte index into the name table.
    fn read_fname(&mut self) -> Result<FName> {
        let index = self.read_i32::<LE>()?;
        self.tables().name(index)
    }
    /// Single byte flag, 0 or 1.
    fn read_flag(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::InvalidBool(other as u32)),
        }
    }
    /// 32 bit bool, 0 or 1.
    fn read_bool32(&mut self) -> Result<bool> {
        match self.read_u32::<LE>()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::InvalidBool(other)),
        }
    }
}

/// Typed write access to a package blob.
pub trait ArchiveWriter: Write + Seek + Sized {
    fn tables(&self) -> &PackageTables;
    /// Serialize into a scratch buffer sharing this writer's tables and
    /// return the bytes, so a length can be emitted before them.
    fn measure<F>(&mut self, f: F) -> Result<Vec<u8>>
    where
        F: FnOnce(&mut AssetWriter) -> Result<()>;

    fn position(&mut self) -> Result<u64> {
        Ok(self.stream_position()?)
    }
    fn write_fstring(&mut self, string: &FString) -> Result<()> {
        crate::write_string(self, string)
    }
    fn write_fname(&mut self, name: &FName) -> Result<()> {
        let index = self.tables().name_index(name)?;
        self.write_i32::<LE>(index)?;
        Ok(())
    }
    fn write_flag(&mut self, value: bool) -> Result<()> {
        self.write_u8(value as u8)?;
        Ok(())
    }
    fn write_bool32(&mut self, value: bool) -> Result<()> {
        self.write_u32::<LE>(value as u32)?;
        Ok(())
    }
}

impl<R> ArchiveReader for Context<R>
where
    R: Read + Seek,
{
    fn file(&self) -> PackageFile {
        self.state.file
    }
    fn tables(&self) -> &PackageTables {
        &self.state.tables
    }
    fn payload(&self, payload: PayloadType) -> Option<&[u8]> {
        self.state.payloads.get(&payload).map(|p| &p[..])
    }
    fn log(&self) -> bool {
        Context::log(self)
    }
    fn path(&self) -> String {
        Context::path(self)
    }
    fn with_scope<F, T>(&mut self, name: &str, f: F) -> T
    where
        F: FnOnce(&mut Self) -> T,
    {
        Context::with_scope(self, name, f)
    }
    fn struct_type_or(&mut self, default: &StructType) -> Result<StructType> {
        self.get_type_or(default)
    }
    fn report(&mut self, kind: DiagnosticKind, message: String) -> Result<()> {
        Context::report(self, kind, message)
    }
}
impl<W> ArchiveWriter for Context<W>
where
    W: Write + Seek,
{
    fn tables(&self) -> &PackageTables {
        &self.state.tables
    }
    fn measure<F>(&mut self, f: F) -> Result<Vec<u8>>
    where
        F: FnOnce(&mut AssetWriter) -> Result<()>,
    {
        let mut scratch = Context::new(Cursor::new(vec![]), self.state.scratch());
        f(&mut scratch)?;
        Ok(scratch.into_inner().into_inner())
    }
}
