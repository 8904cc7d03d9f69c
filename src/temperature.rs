use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use std::fmt::{self, Debug};

pub const CELSIUS_OFFSET: f64 = 273.15;

//
// Represents a temperature in Kelvin.
//
#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct Temp {
    value_kelvin: f64,
}

impl Temp {
    pub fn new(value_kelvin: f64) -> Self {
        Self { value_kelvin }
    }

    //
    // Y16 thermal sensors report samples in 1/100th's Kelvin
    //
    pub fn from_centi_kelvin(raw: f64) -> Self {
        Self {
            value_kelvin: raw / 100.0,
        }
    }

    pub fn from_celsius(value: f64) -> Self {
        Temp::from_unit(TemperatureUnit::Celsius, value)
    }

    pub fn from_unit(unit: TemperatureUnit, value: f64) -> Self {
        Self {
            value_kelvin: match unit {
                TemperatureUnit::Kelvin => value,
                TemperatureUnit::Celsius => value + CELSIUS_OFFSET,
                TemperatureUnit::Fahrenheit => (value - 32.0) / 1.8 + CELSIUS_OFFSET,
            },
        }
    }

    pub fn to_unit(self, unit: TemperatureUnit) -> f64 {
        match unit {
            TemperatureUnit::Kelvin => self.value_kelvin,
            TemperatureUnit::Celsius => self.value_kelvin - CELSIUS_OFFSET,
            TemperatureUnit::Fahrenheit => (self.value_kelvin - CELSIUS_OFFSET) * 1.8 + 32.0,
        }
    }

    pub fn to_centi_kelvin(self) -> f64 {
        self.value_kelvin * 100.0
    }
}

impl Debug for Temp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let debug_unit = TemperatureUnit::Celsius;
        write!(f, "{} {}", self.to_unit(debug_unit), debug_unit.suffix())
    }
}

#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempRange {
    pub min: Temp,
    pub max: Temp,
}

impl TempRange {
    pub fn new(min: Temp, max: Temp) -> Self {
        Self { min, max }
    }

    //
    // Position of temp inside the range, 0.0 at min and 1.0 at max.
    // A collapsed range maps everything to 0.0.
    //
    pub fn factor(&self, temp: Temp) -> f64 {
        let span = self.max.value_kelvin - self.min.value_kelvin;
        if span <= 0.0 {
            return 0.0;
        }
        (temp.value_kelvin - self.min.value_kelvin) / span
    }

    pub fn contains(&self, temp: Temp) -> bool {
        temp.value_kelvin >= self.min.value_kelvin && temp.value_kelvin <= self.max.value_kelvin
    }
}

impl Debug for TempRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?} - {:?}]", self.min, self.max)
    }
}

#[derive(EnumIter, Display, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TemperatureUnit {
    Kelvin,
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn suffix(&self) -> String {
        match self {
            TemperatureUnit::Kelvin => "K".to_string(),
            TemperatureUnit::Celsius => "°C".to_string(),
            TemperatureUnit::Fahrenheit => "°F".to_string(),
        }
    }

    pub fn format(&self, celsius: f64) -> String {
        format!(
            "{:.2}{}",
            Temp::from_celsius(celsius).to_unit(*self),
            self.suffix()
        )
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_centi_kelvin_to_celsius() {
        assert_relative_eq!(
            Temp::from_centi_kelvin(29815.0).to_unit(TemperatureUnit::Celsius),
            25.0,
            epsilon = 1e-9
        );
        assert_relative_eq!(Temp::from_celsius(25.0).to_centi_kelvin(), 29815.0, epsilon = 1e-9);
    }

    #[test]
    fn test_fahrenheit_conversion() {
        let t = Temp::from_unit(TemperatureUnit::Fahrenheit, 212.0);
        assert_relative_eq!(t.to_unit(TemperatureUnit::Celsius), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_range_factor() {
        let range = TempRange::new(Temp::from_celsius(0.0), Temp::from_celsius(50.0));
        assert_relative_eq!(range.factor(Temp::from_celsius(25.0)), 0.5, epsilon = 1e-9);
        assert!(range.contains(Temp::from_celsius(50.0)));
        assert!(!range.contains(Temp::from_celsius(50.1)));

        let collapsed = TempRange::new(Temp::from_celsius(10.0), Temp::from_celsius(10.0));
        assert_eq!(collapsed.factor(Temp::from_celsius(10.0)), 0.0);
    }

    #[test]
    fn test_unit_format() {
        assert_eq!(TemperatureUnit::Celsius.format(25.0), "25.00°C");
        assert_eq!(TemperatureUnit::Kelvin.format(0.0), "273.15K");
    }
}
