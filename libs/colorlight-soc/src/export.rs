//! `csr.csv` and JSON descriptions of an assembled platform.
//!
//! The CSV uses the row layout LiteX tooling reads:
//! `csr_base,<name>,<addr>,,`, `constant,<name>,<value>,,` and
//! `memory_region,<name>,<addr>,<size>,<cached|io>`.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use crate::compose::AssembledPlatform;
use crate::Error;

pub fn write_csr_csv<W: Write>(platform: &AssembledPlatform, writer: W) -> Result<(), Error> {
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(writer);
    for csr in &platform.csrs {
        wtr.write_record(&["csr_base", csr.name.as_str(), format!("0x{:08x}", csr.base).as_str(), "", ""])?;
    }
    for (name, value) in &platform.constants {
        wtr.write_record(&["constant", name.as_str(), value.as_str(), "", ""])?;
    }
    for region in &platform.memory_regions {
        let kind = if region.cached { "cached" } else { "io" };
        wtr.write_record(&[
            "memory_region",
            region.name.as_str(),
            format!("0x{:08x}", region.base).as_str(),
            region.size.to_string().as_str(),
            kind,
        ])?;
    }
    // The CSR space itself, as LiteX lists it
    let csr_size = platform.csrs.len() as u32 * crate::compose::CSR_PAGING;
    let csr_base = format!("0x{:08x}", platform.csr_base);
    wtr.write_record(&["memory_region", "csr", csr_base.as_str(), csr_size.to_string().as_str(), "io"])?;
    wtr.flush()?;
    Ok(())
}

pub fn write_json<W: Write>(platform: &AssembledPlatform, writer: W) -> Result<(), Error> {
    serde_json::to_writer_pretty(writer, platform)?;
    Ok(())
}

/// Parse a decimal, `0x` hexadecimal or `0b` binary number, either prefix case.
pub fn parse_u32(value: &str) -> Result<u32, Error> {
    let trimmed = value.trim();
    let (digits, radix) = match trimmed.get(..2) {
        Some("0x") | Some("0X") => (&trimmed[2..], 16),
        Some("0b") | Some("0B") => (&trimmed[2..], 2),
        _ => (trimmed, 10),
    };
    u32::from_str_radix(digits, radix).map_err(|_| Error::invalid("number", value))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRegion {
    pub base: u32,
    pub size: u32,
    pub cached: bool,
}

/// Contents of a `csr.csv`, keyed by name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CsrMap {
    pub csr_bases: BTreeMap<String, u32>,
    pub regions: BTreeMap<String, CsvRegion>,
    pub constants: BTreeMap<String, String>,
}

/// Read back a `csr.csv`. Short or unrecognised rows are skipped.
pub fn parse_csr_csv<R: Read>(reader: R) -> Result<CsrMap, Error> {
    let mut map = CsrMap::default();
    let mut rdr = csv::ReaderBuilder::new().flexible(true).has_headers(false).from_reader(reader);
    for result in rdr.records() {
        let r = result?;
        if r.is_empty() {
            continue;
        }
        match &r[0] {
            "csr_base" if r.len() >= 3 => {
                map.csr_bases.insert(r[1].to_string(), parse_u32(&r[2])?);
            }
            "constant" if r.len() >= 3 => {
                map.constants.insert(r[1].to_string(), r[2].to_string());
            }
            "memory_region" if r.len() >= 4 => {
                let cached = r.get(4) == Some("cached");
                map.regions.insert(
                    r[1].to_lowercase(),
                    CsvRegion { base: parse_u32(&r[2])?, size: parse_u32(&r[3])?, cached },
                );
            }
            other => log::warn!("csv: ignoring {} row with {} fields", other, r.len()),
        }
    }
    Ok(map)
}

/// Check that a `csr.csv` read back from disk lists exactly the platform's CSR banks,
/// memory regions and constants.
pub fn check_csr_csv<R: Read>(platform: &AssembledPlatform, reader: R) -> Result<(), Error> {
    let map = parse_csr_csv(reader)?;
    let mismatch = |what: String| -> Result<(), Error> { Err(Error::CsrMapMismatch(what)) };

    if map.csr_bases.len() != platform.csrs.len() {
        return mismatch(format!("{} CSR banks, expected {}", map.csr_bases.len(), platform.csrs.len()));
    }
    for csr in &platform.csrs {
        if map.csr_bases.get(&csr.name) != Some(&csr.base) {
            return mismatch(format!("csr_base {}", csr.name));
        }
    }
    for region in &platform.memory_regions {
        let expected = CsvRegion { base: region.base, size: region.size, cached: region.cached };
        if map.regions.get(&region.name) != Some(&expected) {
            return mismatch(format!("memory_region {}", region.name));
        }
    }
    if map.constants != platform.constants {
        return mismatch("constants".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_default, SocOptions};

    fn platform() -> AssembledPlatform {
        let mut options = SocOptions::default();
        options.with_radio_spi = true;
        options.with_ethernet = true;
        build_default(&options).unwrap()
    }

    #[test]
    fn numbers() {
        assert_eq!(parse_u32("0x40000000").unwrap(), 0x4000_0000);
        assert_eq!(parse_u32("0b101").unwrap(), 5);
        assert_eq!(parse_u32("0X1F").unwrap(), 0x1f);
        assert_eq!(parse_u32("8192").unwrap(), 8192);
        assert!(parse_u32("0xzz").is_err());
        assert!(parse_u32("").is_err());
    }

    #[test]
    fn written_csv_checks_out() {
        let platform = platform();
        let mut out = Vec::new();
        write_csr_csv(&platform, &mut out).unwrap();
        check_csr_csv(&platform, out.as_slice()).unwrap();

        let text = String::from_utf8(out).unwrap().replace("csr_base,spi,", "csr_base,spi_old,");
        assert!(matches!(
            check_csr_csv(&platform, text.as_bytes()),
            Err(Error::CsrMapMismatch(what)) if what == "csr_base spi"
        ));
        let truncated: String = text.lines().filter(|l| !l.contains("ethmac,0x8")).map(|l| format!("{}\n", l)).collect();
        assert!(check_csr_csv(&platform, truncated.as_bytes()).is_err());
    }

    #[test]
    fn csv_lists_everything() {
        let platform = platform();
        let mut out = Vec::new();
        write_csr_csv(&platform, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("csr_base,ctrl,0xf0000000,,\n"));
        assert!(text.contains("memory_region,ethmac,0x80000000,8192,io\n"));

        let map = parse_csr_csv(text.as_bytes()).unwrap();
        assert_eq!(map.csr_bases.len(), platform.csrs.len());
        assert_eq!(map.csr_bases["spi"], platform.csr("spi").unwrap().base);
        assert_eq!(map.constants["localip"], "192.168.1.50");
        let main_ram = &map.regions["main_ram"];
        assert_eq!((main_ram.base, main_ram.size, main_ram.cached), (0x4000_0000, 8 * 1024 * 1024, true));
        assert_eq!(map.regions["csr"].size, platform.csrs.len() as u32 * 0x800);
    }

    #[test]
    fn json_names_domains() {
        let mut out = Vec::new();
        write_json(&platform(), &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["device"], "LFE5U-25F-6BG381C");
        assert_eq!(value["subsystems"][0]["name"], "sdram");
        assert_eq!(value["constants"]["config_clock_frequency"], "60000000");
    }
}
