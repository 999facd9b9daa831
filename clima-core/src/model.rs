use serde::{Deserialize, Serialize};

/// Offset between kelvin and Celsius.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Icon shown for condition codes outside every known band.
pub const UNKNOWN_ICON: &str = "dunno";

/// Map an upstream condition code to an icon identifier.
///
/// Total over `i64`: codes outside every band get [`UNKNOWN_ICON`].
pub fn derive_icon(condition: i64) -> &'static str {
    match condition {
        0..=300 => "tstorm1",
        301..=500 => "light_rain",
        501..=600 => "shower3",
        601..=700 => "snow4",
        701..=771 => "fog",
        772..=799 => "tstorm3",
        800 => "sunny",
        801..=804 => "cloudy2",
        903 => "snow5",
        904 => "sunny",
        900..=902 | 905..=1000 => "tstorm3",
        _ => UNKNOWN_ICON,
    }
}

/// The subset of an upstream response the record cares about.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    pub name: String,
    /// Kelvin. `None` when the response carried no `main.temp`.
    pub temperature: Option<f64>,
    pub condition: Option<i64>,
}

/// Last-fetched weather, in source units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherRecord {
    pub temperature: f64,
    pub city: String,
    condition: Option<i64>,
    icon: Option<&'static str>,
}

impl WeatherRecord {
    pub const CITY_NOT_FOUND: &'static str = "City not found";

    pub fn condition(&self) -> Option<i64> {
        self.condition
    }

    pub fn icon(&self) -> Option<&'static str> {
        self.icon
    }

    /// Set the condition code and the icon derived from it.
    pub fn update_icon(&mut self, condition: i64) {
        self.condition = Some(condition);
        self.icon = Some(derive_icon(condition));
    }

    /// Fold a successful fetch into the record.
    ///
    /// A missing temperature keeps the previous value and replaces the city
    /// with [`Self::CITY_NOT_FOUND`]. A missing condition leaves the icon alone.
    pub fn apply(&mut self, observation: Observation) {
        self.city = observation.name;

        match observation.temperature {
            Some(temp) => self.temperature = temp,
            None => self.city = Self::CITY_NOT_FOUND.to_string(),
        }

        if let Some(condition) = observation.condition {
            self.update_icon(condition);
        }
    }
}

/// What a fetch is keyed by.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Coordinates { lat: f64, lon: f64 },
    City(String),
}

impl Query {
    fn pairs(&self) -> Vec<(&'static str, String)> {
        match self {
            Query::Coordinates { lat, lon } => vec![("lat", lat.to_string()), ("lon", lon.to_string())],
            Query::City(name) => vec![("q", name.clone())],
        }
    }

    /// Request parameters: the credential with the query pairs merged over it.
    pub fn params(&self, appid: &str) -> Vec<(&'static str, String)> {
        let mut params = vec![("appid", appid.to_string())];

        for (key, value) in self.pairs() {
            match params.iter_mut().find(|(k, _)| *k == key) {
                Some(existing) => existing.1 = value,
                None => params.push((key, value)),
            }
        }

        params
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayUnits {
    #[default]
    Celsius,
    Fahrenheit,
}

impl DisplayUnits {
    pub fn from_celsius_flag(is_celsius: bool) -> Self {
        if is_celsius { Self::Celsius } else { Self::Fahrenheit }
    }

    pub fn is_celsius(self) -> bool {
        self == Self::Celsius
    }

    /// Convert kelvin into this unit.
    pub fn convert(self, kelvin: f64) -> f64 {
        let celsius = kelvin - KELVIN_OFFSET;
        match self {
            Self::Celsius => celsius,
            Self::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
        }
    }

    /// Whole degrees with a degree mark, e.g. `17°`.
    pub fn format(self, kelvin: f64) -> String {
        format!("{}°", self.convert(kelvin).round() as i64)
    }
}

/// The three rendered outputs: city text, temperature text, icon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WeatherView {
    pub city: String,
    pub temperature: String,
    pub icon: Option<&'static str>,
}

impl WeatherView {
    pub fn render(record: &WeatherRecord, units: DisplayUnits) -> Self {
        Self {
            city: record.city.clone(),
            temperature: units.format(record.temperature),
            icon: record.icon(),
        }
    }
}

impl std::fmt::Display for WeatherView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}  {}", self.city, self.temperature)?;
        if let Some(icon) = self.icon {
            write!(f, "  [{icon}]")?;
        }
        Ok(())
    }
}
