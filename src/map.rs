use crate::model::attendance::Location;

/// Single seam for map rendering: one provider behind one interface.
pub trait MapRenderer: Send + Sync {
    /// Render a titled HTML view of `location` with a marker on it.
    fn render(&self, location: &Location, title: &str) -> String;

    /// Fallback view for a missing or unparseable location.
    fn render_unavailable(&self, title: &str) -> String {
        format!(
            "<div class=\"map-unavailable\"><h2>{}</h2><p>Location not available</p></div>",
            html_escape(title)
        )
    }
}

/// OpenStreetMap tile embed.
pub struct OpenStreetMap {
    /// Half-width of the embedded bounding box, in degrees.
    pub span: f64,
}

impl Default for OpenStreetMap {
    fn default() -> Self {
        Self { span: 0.005 }
    }
}

impl MapRenderer for OpenStreetMap {
    fn render(&self, location: &Location, title: &str) -> String {
        let bbox = format!(
            "{:.6}%2C{:.6}%2C{:.6}%2C{:.6}",
            location.lng - self.span,
            location.lat - self.span,
            location.lng + self.span,
            location.lat + self.span
        );
        let marker = format!("{:.6}%2C{:.6}", location.lat, location.lng);

        format!(
            concat!(
                "<div class=\"map-view\">",
                "<h2>{title}</h2>",
                "<p class=\"coords\">{coords}</p>",
                "<iframe width=\"100%\" height=\"320\" frameborder=\"0\" ",
                "src=\"https://www.openstreetmap.org/export/embed.html?bbox={bbox}&amp;layer=mapnik&amp;marker={marker}\">",
                "</iframe>",
                "</div>"
            ),
            title = html_escape(title),
            coords = location,
            bbox = bbox,
            marker = marker,
        )
    }
}

pub fn html_escape(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '&' => "&amp;".to_string(),
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '"' => "&quot;".to_string(),
            '\'' => "&#39;".to_string(),
            _ => c.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_carries_marker_and_bbox() {
        let loc = Location {
            lat: 23.780573,
            lng: 90.419418,
        };
        let html = OpenStreetMap::default().render(&loc, "Clock-in Location");

        assert!(html.contains("marker=23.780573%2C90.419418"));
        assert!(html.contains("openstreetmap.org/export/embed.html"));
        assert!(html.contains("Clock-in Location"));
        assert!(html.contains("23.780573, 90.419418"));
    }

    #[test]
    fn unavailable_view_degrades_gracefully() {
        let html = OpenStreetMap::default().render_unavailable("Clock-in Location");
        assert!(html.contains("Location not available"));
    }

    #[test]
    fn titles_are_escaped() {
        let html = OpenStreetMap::default().render_unavailable("<script>alert(1)</script>");
        assert!(!html.contains("<script>"));
    }
}
