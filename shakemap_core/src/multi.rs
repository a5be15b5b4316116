//! Dense [site][column] tables of ground motion and their EQRM text form.
//!
//! A column is either one realization (the catalog-wide grid, one column
//! per rupture) or one spectral period (the per-rupture holder written to a
//! scenario file).

use shakemap_env::Site;
use std::fmt::Write as _;
use std::sync::OnceLock;

use crate::error::{Result, ShakeMapError};

/// Row duplication expected by the legacy EQRM reader.
pub const EQRM_ROW_REPEATS: usize = 8;

/// Ground motion at every site for a set of columns.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiScenarioShakeMap {
    lons: Vec<f64>,
    lats: Vec<f64>,
    
    /// values[site][column]
    values: Vec<Vec<f64>>,
    
    num_columns: usize,
    
    /// One period per column, if the columns are periods
    periods: Option<Vec<f64>>,
}

impl MultiScenarioShakeMap {
    /// Creates a NaN-filled table.
    pub fn new(
        lons: Vec<f64>,
        lats: Vec<f64>,
        num_columns: usize,
        periods: Option<Vec<f64>>,
    ) -> Result<Self> {
        if lons.len() != lats.len() {
            return Err(ShakeMapError::SiteCountMismatch {
                expected: lons.len(),
                got: lats.len(),
            });
        }
        if let Some(p) = &periods {
            if p.len() != num_columns {
                return Err(ShakeMapError::invalid(format!(
                    "{} periods for {} columns",
                    p.len(),
                    num_columns
                )));
            }
        }
        let values = vec![vec![f64::NAN; num_columns]; lons.len()];
        Ok(Self {
            lons,
            lats,
            values,
            num_columns,
            periods,
        })
    }
    
    /// Creates a NaN-filled table over the coordinates of `sites`.
    pub fn for_sites(sites: &[Site], num_columns: usize, periods: Option<Vec<f64>>) -> Result<Self> {
        let lons = sites.iter().map(|s| s.location.lon).collect();
        let lats = sites.iter().map(|s| s.location.lat).collect();
        Self::new(lons, lats, num_columns, periods)
    }
    
    /// Installs a full column of site values at `index`.
    pub fn set(&mut self, index: usize, values: &[f64]) -> Result<()> {
        self.check_column(index)?;
        if values.len() != self.num_sites() {
            return Err(ShakeMapError::SiteCountMismatch {
                expected: self.num_sites(),
                got: values.len(),
            });
        }
        for (row, v) in self.values.iter_mut().zip(values) {
            row[index] = *v;
        }
        Ok(())
    }
    
    /// Returns the column at `index` across all sites.
    pub fn get(&self, index: usize) -> Result<Vec<f64>> {
        self.check_column(index)?;
        Ok(self.values.iter().map(|row| row[index]).collect())
    }
    
    /// Returns every column value at one site.
    pub fn at_site(&self, site: usize) -> Option<&[f64]> {
        self.values.get(site).map(Vec::as_slice)
    }
    
    pub fn num_sites(&self) -> usize {
        self.lons.len()
    }
    
    pub fn num_columns(&self) -> usize {
        self.num_columns
    }
    
    pub fn lons(&self) -> &[f64] {
        &self.lons
    }
    
    pub fn lats(&self) -> &[f64] {
        &self.lats
    }
    
    pub fn periods(&self) -> Option<&[f64]> {
        self.periods.as_deref()
    }
    
    fn check_column(&self, index: usize) -> Result<()> {
        let len = self.num_columns();
        if index >= len {
            return Err(ShakeMapError::ColumnOutOfRange { index, len });
        }
        Ok(())
    }
    
    /// Renders the table in the legacy EQRM layout with 8× row duplication.
    pub fn to_eqrm_legacy(&self) -> String {
        self.to_eqrm(EQRM_ROW_REPEATS)
    }
    
    /// Renders the table in the EQRM layout.
    ///
    /// ```text
    /// %
    /// % haz
    /// <periods, 3 decimals>
    /// <site 0 values, 5 decimals>    (row_repeats times)
    /// <site 1 values, 5 decimals>    ...
    /// ```
    ///
    /// The periods line is empty when the table has no period list.
    pub fn to_eqrm(&self, row_repeats: usize) -> String {
        let mut out = String::from("%\n% haz\n");
        
        if let Some(periods) = &self.periods {
            out.push_str(&join_fixed(periods, 3));
        }
        out.push('\n');
        
        for row in &self.values {
            let line = join_fixed(row, 5);
            for _ in 0..row_repeats.max(1) {
                out.push_str(&line);
                out.push('\n');
            }
        }
        out
    }
    
    /// Parses EQRM text back into a table, collapsing duplicated rows.
    ///
    /// Coordinates are not part of the format and must be supplied.
    pub fn from_eqrm(text: &str, lons: Vec<f64>, lats: Vec<f64>) -> Result<Self> {
        let mut lines = text.lines().enumerate();
        
        for expected in ["%", "% haz"] {
            match lines.next() {
                Some((_, line)) if line.trim_end() == expected => {}
                Some((n, line)) => {
                    return Err(ShakeMapError::parse(
                        n + 1,
                        format!("expected '{}', found '{}'", expected, line),
                    ));
                }
                None => return Err(ShakeMapError::parse(0, "truncated header")),
            }
        }
        
        let periods = match lines.next() {
            Some((n, line)) => {
                let parsed = parse_row(line, n + 1)?;
                if parsed.is_empty() {
                    None
                } else {
                    Some(parsed)
                }
            }
            None => return Err(ShakeMapError::parse(2, "missing periods line")),
        };
        
        let rows: Vec<(usize, &str)> = lines.filter(|(_, l)| !l.trim().is_empty()).collect();
        let num_sites = lons.len();
        if num_sites == 0 {
            return Err(ShakeMapError::invalid("no site coordinates supplied"));
        }
        if rows.len() % num_sites != 0 || rows.is_empty() {
            return Err(ShakeMapError::parse(
                rows.last().map(|(n, _)| n + 1).unwrap_or(3),
                format!("{} value rows do not divide into {} sites", rows.len(), num_sites),
            ));
        }
        let repeats = rows.len() / num_sites;
        
        let mut values = Vec::with_capacity(num_sites);
        for block in rows.chunks(repeats) {
            let (first_no, first) = block[0];
            if let Some((n, _)) = block.iter().find(|(_, l)| l.trim() != first.trim()) {
                return Err(ShakeMapError::parse(n + 1, "duplicated row differs from its block"));
            }
            values.push(parse_row(first, first_no + 1)?);
        }
        
        let num_columns = periods
            .as_ref()
            .map(Vec::len)
            .unwrap_or_else(|| values[0].len());
        if let Some(bad) = values.iter().position(|r| r.len() != num_columns) {
            return Err(ShakeMapError::parse(
                rows[bad * repeats].0 + 1,
                format!("expected {} values", num_columns),
            ));
        }
        
        let mut map = Self::new(lons, lats, num_columns, periods)?;
        map.values = values;
        Ok(map)
    }
}

fn join_fixed(values: &[f64], decimals: usize) -> String {
    let mut s = String::with_capacity(values.len() * (decimals + 4));
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            s.push(' ');
        }
        let _ = write!(s, "{:.*}", decimals, v);
    }
    s
}

fn parse_row(line: &str, line_no: usize) -> Result<Vec<f64>> {
    line.split_whitespace()
        .map(|tok| {
            tok.parse::<f64>()
                .map_err(|_| ShakeMapError::parse(line_no, format!("bad number '{}'", tok)))
        })
        .collect()
}

/// Write-once column storage shared by concurrent workers.
///
/// Pre-sized before workers start; each column accepts exactly one write.
/// Workers own disjoint column ranges, so writes never contend; a second
/// write to the same column is reported as an error instead of overwriting.
#[derive(Debug)]
pub struct ColumnSlots {
    num_sites: usize,
    slots: Vec<OnceLock<Vec<f64>>>,
}

impl ColumnSlots {
    pub fn new(num_sites: usize, num_columns: usize) -> Self {
        Self {
            num_sites,
            slots: (0..num_columns).map(|_| OnceLock::new()).collect(),
        }
    }
    
    pub fn len(&self) -> usize {
        self.slots.len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
    
    /// Stores the column at `index`.
    pub fn fill(&self, index: usize, values: Vec<f64>) -> Result<()> {
        let slot = self.slots.get(index).ok_or(ShakeMapError::ColumnOutOfRange {
            index,
            len: self.slots.len(),
        })?;
        if values.len() != self.num_sites {
            return Err(ShakeMapError::SiteCountMismatch {
                expected: self.num_sites,
                got: values.len(),
            });
        }
        slot.set(values)
            .map_err(|_| ShakeMapError::ColumnAlreadyFilled(index))
    }
    
    /// Whether column `index` has been written.
    pub fn is_filled(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(|s| s.get().is_some())
    }
    
    /// Assembles the dense table; returns it with the indices never filled (left NaN).
    pub fn into_shake_map(
        self,
        lons: Vec<f64>,
        lats: Vec<f64>,
    ) -> Result<(MultiScenarioShakeMap, Vec<usize>)> {
        let mut map = MultiScenarioShakeMap::new(lons, lats, self.slots.len(), None)?;
        let mut missing = Vec::new();
        for (index, slot) in self.slots.into_iter().enumerate() {
            match slot.into_inner() {
                Some(column) => map.set(index, &column)?,
                None => missing.push(index),
            }
        }
        Ok((map, missing))
    }
}
