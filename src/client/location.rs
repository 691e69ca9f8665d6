//! Country / state / city pickers. Choosing a parent clears everything below it.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Place {
    pub code: String,
    pub name: String,
}

impl Place {
    fn new(code: &str, name: &str) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// Source of the option lists. The real data set lives outside this crate.
pub trait LocationDirectory {
    fn countries(&self) -> Vec<Place>;
    fn states(&self, country: &str) -> Vec<Place>;
    fn cities(&self, country: &str, state: &str) -> Vec<String>;
}

type CountryRow = (&'static str, &'static str, &'static [StateRow]);
type StateRow = (&'static str, &'static str, &'static [&'static str]);

/// Small built-in table, enough for local runs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticDirectory;

static TABLE: &[CountryRow] = &[
    (
        "IN",
        "India",
        &[
            ("MH", "Maharashtra", &["Mumbai", "Pune", "Nagpur"]),
            ("KA", "Karnataka", &["Bengaluru", "Mysuru"]),
        ],
    ),
    (
        "US",
        "United States",
        &[
            ("CA", "California", &["Los Angeles", "San Francisco"]),
            ("NY", "New York", &["New York City", "Buffalo"]),
        ],
    ),
    ("DE", "Germany", &[("BE", "Berlin", &["Berlin"])]),
];

impl StaticDirectory {
    fn country(code: &str) -> Option<&'static CountryRow> {
        TABLE.iter().find(|(c, _, _)| *c == code)
    }
}

impl LocationDirectory for StaticDirectory {
    fn countries(&self) -> Vec<Place> {
        TABLE.iter().map(|(c, n, _)| Place::new(c, n)).collect()
    }

    fn states(&self, country: &str) -> Vec<Place> {
        Self::country(country)
            .map(|(_, _, states)| states.iter().map(|(c, n, _)| Place::new(c, n)).collect())
            .unwrap_or_default()
    }

    fn cities(&self, country: &str, state: &str) -> Vec<String> {
        Self::country(country)
            .and_then(|(_, _, states)| states.iter().find(|(c, _, _)| *c == state))
            .map(|(_, _, cities)| cities.iter().map(|c| c.to_string()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationSelection {
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
}

fn non_empty(v: &str) -> Option<String> {
    let v = v.trim();
    (!v.is_empty()).then(|| v.to_string())
}

impl LocationSelection {
    /// An empty code clears the selection.
    pub fn set_country(&mut self, code: &str) {
        self.country = non_empty(code);
        self.state = None;
        self.city = None;
    }

    pub fn set_state(&mut self, code: &str) {
        self.state = non_empty(code);
        self.city = None;
    }

    pub fn set_city(&mut self, name: &str) {
        self.city = non_empty(name);
    }

    pub fn city_enabled(&self) -> bool {
        self.state.is_some()
    }

    pub fn state_options(&self, dir: &dyn LocationDirectory) -> Vec<Place> {
        match &self.country {
            Some(c) => dir.states(c),
            None => Vec::new(),
        }
    }

    pub fn city_options(&self, dir: &dyn LocationDirectory) -> Vec<String> {
        match (&self.country, &self.state) {
            (Some(c), Some(s)) => dir.cities(c, s),
            _ => Vec::new(),
        }
    }
}
