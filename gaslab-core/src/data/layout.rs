//! Column layouts of the whitespace-delimited text files each program publishes.

/// What a whitespace-separated token position holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    /// `yyyymmdd`
    CompactDate,
    /// `hhmm` or `hhmmss`
    CompactTime,
    Site,
    /// Numeric column under its program-native name.
    Value(&'static str),
    /// Every remaining token is a numeric column named by the header line.
    /// Only valid as the last role of a variant.
    Rest,
    Skip,
}

/// How to read one program's file at one cadence.
#[derive(Debug, Clone, PartialEq)]
pub struct TableLayout {
    /// Candidate column sets. The first whose length equals the row width
    /// wins; otherwise the widest one that fits.
    pub variants: Vec<Vec<ColumnRole>>,
    /// Tokens read as missing values (in addition to non-finite numbers).
    pub na_tokens: Vec<&'static str>,
    pub comment: Option<char>,
}

impl TableLayout {
    pub fn new(columns: Vec<ColumnRole>) -> Self {
        Self {
            variants: vec![columns],
            na_tokens: Vec::new(),
            comment: Some('#'),
        }
    }

    pub fn with_variant(mut self, columns: Vec<ColumnRole>) -> Self {
        self.variants.push(columns);
        self
    }

    pub fn with_na_tokens(mut self, tokens: &[&'static str]) -> Self {
        self.na_tokens.extend_from_slice(tokens);
        self
    }

    /// Column set for a row with `width` tokens. A variant ending in
    /// [`ColumnRole::Rest`] fits any row at least as wide as itself.
    pub fn variant_for(&self, width: usize) -> Option<&[ColumnRole]> {
        if let Some(exact) = self.variants.iter().find(|v| v.len() == width) {
            return Some(exact);
        }
        self.variants
            .iter()
            .filter(|v| v.len() <= width)
            .max_by_key(|v| v.len())
            .map(|v| v.as_slice())
    }

    pub fn is_na(&self, token: &str) -> bool {
        self.na_tokens.iter().any(|na| *na == token)
    }

    /// Combined regional means: `yyyy mm` followed by one value and one `_sd`
    /// column per region, as named in the header.
    pub fn combined() -> Self {
        use ColumnRole::*;
        Self::new(vec![Year, Month, Rest])
    }

    /// Monthly in situ medians: `yyyy mm mr sd n` or `yyyy mm mr unc sd n`.
    pub fn insitu_monthly() -> Self {
        use ColumnRole::*;
        Self::new(vec![Year, Month, Value("mr"), Value("sd"), Value("n")])
            .with_variant(vec![Year, Month, Value("mr"), Value("unc"), Value("sd"), Value("n")])
    }

    /// Daily in situ means: `yyyy mm dd mr unc n`.
    pub fn insitu_daily() -> Self {
        use ColumnRole::*;
        Self::new(vec![Year, Month, Day, Value("mr"), Value("unc"), Value("n")])
    }

    /// Hourly in situ values: `yyyy mm dd hh mn mr unc`, with `Nan` for missing.
    pub fn insitu_hourly() -> Self {
        use ColumnRole::*;
        Self::new(vec![Year, Month, Day, Hour, Minute, Value("mr"), Value("unc")])
            .with_na_tokens(&["Nan"])
    }

    /// Flask GC-ECD monthly means: `yyyy mm m msd num`.
    pub fn flask_monthly() -> Self {
        use ColumnRole::*;
        Self::new(vec![Year, Month, Value("m"), Value("msd"), Value("num")])
    }

    /// Network-wide flask pair file (GC-MS or PR1 format).
    ///
    /// `nd` and `0.0` mark missing values.
    pub fn flask_pairs() -> Self {
        use ColumnRole::*;
        Self::new(vec![
            Site,
            Skip,
            CompactDate,
            CompactTime,
            Value("wind_dir"),
            Value("wind_spd"),
            Value("mf"),
            Value("sd"),
        ])
        .with_variant(vec![
            Site,
            Skip,
            CompactDate,
            CompactTime,
            Value("wind_dir"),
            Value("wind_spd"),
            Value("mf"),
            Value("sd"),
            Skip,
            Skip,
        ])
        .with_na_tokens(&["nd", "0.0"])
    }
}
