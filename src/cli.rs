//! Command-line inspection of the type tables
//!
//! Arguments are parsed by hand. Every command renders to a `String` so
//! the binary stays a thin shell and the commands are testable.

use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::array::NdArray;
use crate::encoding::{ArrayEncoding, TypeIdentifier};
use crate::error::MarshalResult;
use crate::host::{MemoryHost, MemorySlot};
use crate::marshal::{read_array, write_array};
use crate::transfer;
use crate::types::{Boolean, Complex, Element, ElementType, TypeCode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Table,
    TypeId { code: TypeCode, rank: usize },
    Decode { id: i64 },
    Encoding { element: ElementType },
    SelfTest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: Command,
    pub json: bool,
    pub config: Option<PathBuf>,
}

pub fn usage(prog: &str) -> String {
    format!(
        "wlbridge - host argument marshaling tables\n\n\
        USAGE:\n    {} [OPTIONS] <COMMAND>\n\n\
        COMMANDS:\n    \
        table                     Element types, codes and encodings\n    \
        type-id <type> <rank>     Result type identifier\n    \
        decode <id>               Split an identifier into type and rank\n    \
        encoding <element>        Host encoding used for an element type\n    \
        selftest                  Round-trip every element type in memory\n\n\
        OPTIONS:\n    \
        -h, --help                Print help information\n    \
        --json                    Machine-readable output\n    \
        --config <path>           Use this wlbridge.toml\n\n\
        TYPES:\n    \
        bool i8 u8 i16 u16 i32 u32 i64 u64 f32 f64 c32 c64 text null",
        prog
    )
}

/// Type code named on the command line
pub fn parse_type(name: &str) -> Option<TypeCode> {
    match name {
        "text" | "string" | "expr" => Some(TypeCode::MathLink),
        "null" | "void" => Some(TypeCode::Null),
        other => ElementType::from_name(other).map(ElementType::type_code),
    }
}

fn parse_element(name: &str) -> Result<ElementType, String> {
    ElementType::from_name(name).ok_or_else(|| format!("Unknown element type '{}'", name))
}

impl Invocation {
    /// Parse arguments, excluding the program name
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let mut json = false;
        let mut config = None;
        let mut positional = Vec::new();

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--help" | "-h" => return Err(usage("wlbridge")),
                "--json" => json = true,
                "--config" => {
                    let path = iter.next().ok_or("--config needs a path")?;
                    config = Some(PathBuf::from(path));
                }
                opt if opt.starts_with("--") => {
                    return Err(format!("Unknown option: {}\n\n{}", opt, usage("wlbridge")))
                }
                value => positional.push(value),
            }
        }

        let command = match positional.as_slice() {
            ["table"] => Command::Table,
            ["type-id", ty, rank] => Command::TypeId {
                code: parse_type(ty).ok_or_else(|| format!("Unknown type '{}'", ty))?,
                rank: rank.parse().map_err(|_| format!("Invalid rank '{}'", rank))?,
            },
            ["decode", id] => Command::Decode {
                id: id.parse().map_err(|_| format!("Invalid identifier '{}'", id))?,
            },
            ["encoding", element] => Command::Encoding {
                element: parse_element(element)?,
            },
            ["selftest"] => Command::SelfTest,
            [] => return Err(usage("wlbridge")),
            other => return Err(format!("Unknown command: {}\n\n{}", other.join(" "), usage("wlbridge"))),
        };

        Ok(Self { command, json, config })
    }
}

#[derive(Debug, Serialize)]
struct TableRow {
    element: &'static str,
    type_code: i64,
    code_name: &'static str,
    encoding: &'static str,
    host_type: &'static str,
    size: usize,
}

fn host_type_name(element: ElementType) -> &'static str {
    match ArrayEncoding::tensor_kind(element) {
        Some(kind) => kind.name(),
        None => element.numeric_array_type().name(),
    }
}

fn table_rows() -> Vec<TableRow> {
    ElementType::ALL
        .iter()
        .map(|&element| TableRow {
            element: element.name(),
            type_code: element.type_code().raw(),
            code_name: element.type_code().name(),
            encoding: ArrayEncoding::select(element).name(),
            host_type: host_type_name(element),
            size: element.size(),
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct SelfTestResult {
    pub element: &'static str,
    pub encoding: &'static str,
    pub bytes: usize,
    pub passed: bool,
    pub error: Option<String>,
}

/// Write then read back a [2, 3] array with a byte pattern
fn round_trip<T: Element>(host: &MemoryHost) -> MarshalResult<usize> {
    let pattern: Vec<u8> = (0..6 * core::mem::size_of::<T>()).map(|i| (i * 37 + 11) as u8).collect();
    let mut data = vec![T::default(); 6];
    transfer::copy_bytes(&pattern, &mut data);
    let array = NdArray::<T, 2>::from_vec([2, 3], data)?;

    let mut slot = MemorySlot::Empty;
    write_array(host, &mut slot, &array)?;
    let back: NdArray<T, 2> = read_array(host, &slot)?;

    if back.dims() != array.dims() || transfer::bytes_of(back.as_slice()) != pattern.as_slice() {
        return Err(crate::error::MarshalError::type_mismatch(
            "the bytes written",
            "different bytes read back",
        ));
    }
    Ok(pattern.len())
}

fn round_trip_element(host: &MemoryHost, element: ElementType) -> MarshalResult<usize> {
    match element {
        ElementType::Boolean => round_trip::<Boolean>(host),
        ElementType::I8 => round_trip::<i8>(host),
        ElementType::U8 => round_trip::<u8>(host),
        ElementType::I16 => round_trip::<i16>(host),
        ElementType::U16 => round_trip::<u16>(host),
        ElementType::I32 => round_trip::<i32>(host),
        ElementType::U32 => round_trip::<u32>(host),
        ElementType::I64 => round_trip::<i64>(host),
        ElementType::U64 => round_trip::<u64>(host),
        ElementType::R32 => round_trip::<f32>(host),
        ElementType::R64 => round_trip::<f64>(host),
        ElementType::C32 => round_trip::<Complex<f32>>(host),
        ElementType::C64 => round_trip::<Complex<f64>>(host),
    }
}

pub fn self_test() -> Vec<SelfTestResult> {
    let host = MemoryHost::new();
    ElementType::ALL
        .iter()
        .map(|&element| {
            let outcome = round_trip_element(&host, element);
            debug!(element = element.name(), ok = outcome.is_ok(), "self test");
            SelfTestResult {
                element: element.name(),
                encoding: ArrayEncoding::select(element).name(),
                bytes: *outcome.as_ref().unwrap_or(&0),
                passed: outcome.is_ok(),
                error: outcome.err().map(|e| e.to_string()),
            }
        })
        .collect()
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("Failed to encode JSON: {}", e))
}

/// Execute a command, returning its output and whether it succeeded
pub fn execute(command: &Command, json: bool) -> Result<(String, bool), String> {
    info!(command = ?command, json, "running command");

    match command {
        Command::Table => {
            let rows = table_rows();
            if json {
                return Ok((to_json(&rows)?, true));
            }
            let mut out = format!(
                "{:<8} {:>4} {:<9} {:<13} {:<18} {:>4}\n",
                "element", "code", "name", "encoding", "host type", "size"
            );
            for row in &rows {
                out.push_str(&format!(
                    "{:<8} {:>4} {:<9} {:<13} {:<18} {:>4}\n",
                    row.element, row.type_code, row.code_name, row.encoding, row.host_type, row.size
                ));
            }
            Ok((out, true))
        }
        Command::TypeId { code, rank } => {
            let id = TypeIdentifier::try_new(*code, *rank).ok_or("rank too large")?;
            if json {
                let value = serde_json::json!({ "type": code.name(), "rank": rank, "id": id.raw() });
                return Ok((to_json(&value)?, true));
            }
            Ok((format!("{}\n", id), true))
        }
        Command::Decode { id } => match TypeIdentifier::decode(*id) {
            Some((code, rank)) => {
                if json {
                    let value = serde_json::json!({ "id": id, "type": code.name(), "rank": rank });
                    return Ok((to_json(&value)?, true));
                }
                Ok((format!("{} rank {}\n", code, rank), true))
            }
            None => Err(format!("{} is not a valid type identifier", id)),
        },
        Command::Encoding { element } => {
            let encoding = ArrayEncoding::select(*element);
            if json {
                let value = serde_json::json!({
                    "element": element.name(),
                    "encoding": encoding.name(),
                    "host_type": host_type_name(*element),
                });
                return Ok((to_json(&value)?, true));
            }
            Ok((format!("{} ({})\n", encoding, host_type_name(*element)), true))
        }
        Command::SelfTest => {
            let results = self_test();
            let passed = results.iter().all(|r| r.passed);
            if json {
                return Ok((to_json(&results)?, passed));
            }
            let mut out = String::new();
            for r in &results {
                match &r.error {
                    None => out.push_str(&format!("ok    {:<5} {:<13} {} bytes\n", r.element, r.encoding, r.bytes)),
                    Some(e) => out.push_str(&format!("FAIL  {:<5} {:<13} {}\n", r.element, r.encoding, e)),
                }
            }
            Ok((out, passed))
        }
    }
}
