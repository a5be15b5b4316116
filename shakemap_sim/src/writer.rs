//! Text writers for scenario files, event listings and site dumps.

use shakemap_core::MultiScenarioShakeMap;
use shakemap_env::Site;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::SimError;

/// Writes one rupture's [site][period] table as an EQRM scenario file.
pub fn write_scenario_file(
    path: &Path,
    holder: &MultiScenarioShakeMap,
    row_repeats: usize,
) -> Result<(), SimError> {
    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(holder.to_eqrm(row_repeats).as_bytes())?;
    file.flush()?;
    Ok(())
}

/// Appends `<file>,<magnitude>` to an event listing.
pub fn append_event_line<W: Write>(
    listing: &mut W,
    file_name: &str,
    magnitude: f64,
) -> Result<(), SimError> {
    writeln!(listing, "{},{:.2}", file_name, magnitude)?;
    Ok(())
}

/// Creates (truncating) an event listing file.
pub fn create_event_listing(path: &Path) -> Result<BufWriter<File>, SimError> {
    Ok(BufWriter::new(File::create(path)?))
}

/// Writes `lon lat value` per site, fixed-width.
pub fn write_site_dump(path: &Path, sites: &[Site], values: &[f64]) -> Result<(), SimError> {
    if sites.len() != values.len() {
        return Err(SimError::config(format!(
            "site dump needs one value per site ({} sites, {} values)",
            sites.len(),
            values.len()
        )));
    }
    let mut file = BufWriter::new(File::create(path)?);
    write_site_lines(&mut file, sites, values)?;
    file.flush()?;
    Ok(())
}

fn write_site_lines<W: Write>(out: &mut W, sites: &[Site], values: &[f64]) -> std::io::Result<()> {
    for (site, value) in sites.iter().zip(values) {
        writeln!(
            out,
            "{:8.5} {:8.5} {:8.5}",
            site.location.lon, site.location.lat, value
        )?;
    }
    Ok(())
}
