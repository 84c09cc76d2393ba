/*
 *  display/components/weather.rs
 *
 *  cellclock - connected LED matrix clock
 *  (c) 2020-26 Stuart Hunter
 *
 *  Weather display component - glyph plus temperature
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use log::{debug, warn};

use crate::clock_font::{draw_text, TINY_HEIGHT};
use crate::display::error::DisplayError;
use crate::display::pens;
use crate::weather::{TemperatureUnit, WeatherSnapshot};
use crate::weather_glyph::{WeatherGlyph, GLYPH_HEIGHT, GLYPH_WIDTH};

const TEMPERATURE_Y: i32 = 6;

/// Weather display component
#[derive(Debug, Clone)]
pub struct WeatherDisplay {
    panel_width: u32,
    units: TemperatureUnit,
    last_weather: Option<WeatherSnapshot>,
}

impl WeatherDisplay {
    pub fn new(panel_width: u32, units: TemperatureUnit) -> Self {
        Self {
            panel_width,
            units,
            last_weather: None,
        }
    }

    /// Store a new snapshot; true if it differs from the one shown.
    pub fn update(&mut self, snapshot: WeatherSnapshot) -> bool {
        let changed = self.last_weather.as_ref() != Some(&snapshot);
        self.last_weather = Some(snapshot);
        changed
    }

    pub fn weather(&self) -> Option<&WeatherSnapshot> {
        self.last_weather.as_ref()
    }

    /// Glyph sits in the top right corner.
    pub fn glyph_area(&self) -> Rectangle {
        let x = self.panel_width.saturating_sub(GLYPH_WIDTH) as i32;
        Rectangle::new(Point::new(x, 0), Size::new(GLYPH_WIDTH, GLYPH_HEIGHT))
    }

    /// Temperature sits under the clock, left of the glyph.
    pub fn temperature_area(&self) -> Rectangle {
        Rectangle::new(
            Point::new(0, TEMPERATURE_Y),
            Size::new(self.panel_width.saturating_sub(GLYPH_WIDTH), TINY_HEIGHT),
        )
    }

    /// e.g. `"11c"`, `"-3f"`
    pub fn temperature_text(&self) -> Option<String> {
        self.last_weather
            .as_ref()
            .map(|w| format!("{}{}", w.temperature(self.units), self.units.suffix()))
    }

    pub fn render<D>(&self, target: &mut D) -> Result<(), DisplayError>
    where
        D: DrawTarget<Color = Rgb888>,
        DisplayError: From<D::Error>,
    {
        let Some(weather) = &self.last_weather else {
            return Ok(());
        };

        self.glyph_area()
            .into_styled(PrimitiveStyle::with_fill(pens::BLACK))
            .draw(target)?;
        match WeatherGlyph::from_wmo_code(weather.code) {
            Some(glyph) => {
                debug!("weather code {} -> {:?}", weather.code, glyph);
                glyph.draw(target, self.glyph_area().top_left)?;
            }
            None => warn!("no glyph for weather code {}", weather.code),
        }

        self.temperature_area()
            .into_styled(PrimitiveStyle::with_fill(pens::BLACK))
            .draw(target)?;
        self.draw_temperature(target)
    }

    /// Temperature text only, over whatever is already there.
    pub fn draw_temperature<D>(&self, target: &mut D) -> Result<(), DisplayError>
    where
        D: DrawTarget<Color = Rgb888>,
        DisplayError: From<D::Error>,
    {
        if let Some(text) = self.temperature_text() {
            draw_text(target, &text, self.temperature_area().top_left, pens::BLUE)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::framebuffer::FrameBuffer;
    use crate::display::traits::{MATRIX_HEIGHT, MATRIX_WIDTH};

    fn snapshot(code: i32, temperature_celsius: f64) -> WeatherSnapshot {
        WeatherSnapshot { code, temperature_celsius }
    }

    #[test]
    fn test_update_reports_change() {
        let mut w = WeatherDisplay::new(MATRIX_WIDTH, TemperatureUnit::Celsius);
        assert!(w.update(snapshot(0, 11.2)));
        assert!(!w.update(snapshot(0, 11.2)));
        assert!(w.update(snapshot(3, 11.2)));
    }

    #[test]
    fn test_temperature_text_is_floored() {
        let mut w = WeatherDisplay::new(MATRIX_WIDTH, TemperatureUnit::Celsius);
        assert_eq!(w.temperature_text(), None);
        w.update(snapshot(0, 11.9));
        assert_eq!(w.temperature_text().as_deref(), Some("11c"));
        w.update(snapshot(0, -0.5));
        assert_eq!(w.temperature_text().as_deref(), Some("-1c"));

        let mut f = WeatherDisplay::new(MATRIX_WIDTH, TemperatureUnit::Fahrenheit);
        f.update(snapshot(0, 20.0));
        assert_eq!(f.temperature_text().as_deref(), Some("68f"));
    }

    #[test]
    fn test_render_places_glyph_and_temperature() {
        let mut fb = FrameBuffer::new(MATRIX_WIDTH, MATRIX_HEIGHT);
        let mut w = WeatherDisplay::new(MATRIX_WIDTH, TemperatureUnit::Celsius);
        w.update(snapshot(0, 7.4));
        w.render(&mut fb).unwrap();

        assert_eq!(w.glyph_area().top_left, Point::new(42, 0));
        let glyph = WeatherGlyph::Sun.pixels(Point::zero()).count();
        assert_eq!(fb.lit_in(&w.glyph_area()), glyph);
        assert!(fb.lit_in(&w.temperature_area()) > 0);
        assert_eq!(fb.lit_pixels(), glyph + fb.lit_in(&w.temperature_area()));
        assert_eq!(fb.pixel(0, 6), Some(pens::BLUE));
    }

    #[test]
    fn test_unknown_code_clears_glyph() {
        let mut fb = FrameBuffer::new(MATRIX_WIDTH, MATRIX_HEIGHT);
        let mut w = WeatherDisplay::new(MATRIX_WIDTH, TemperatureUnit::Celsius);
        w.update(snapshot(95, 15.0));
        w.render(&mut fb).unwrap();
        assert!(fb.lit_in(&w.glyph_area()) > 0);

        w.update(snapshot(4, 15.0));
        w.render(&mut fb).unwrap();
        assert_eq!(fb.lit_in(&w.glyph_area()), 0);
        assert!(fb.lit_in(&w.temperature_area()) > 0);
    }
}
