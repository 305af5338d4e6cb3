//! Destination URL construction for placements.
//!
//! Query parameter order is fixed: `key`, `campaign_id`, `customer_id`, then
//! `bg` only when the placement declares a background color.

use campaign_core::types::Placement;

pub struct PlacementUrlBuilder<'a> {
    base_url: &'a str,
}

impl<'a> PlacementUrlBuilder<'a> {
    pub fn new(base_url: &'a str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/'),
        }
    }

    pub fn build(
        &self,
        placement: &Placement,
        access_key: &str,
        campaign_id: &str,
        customer_id: Option<&str>,
    ) -> String {
        let mut url = format!(
            "{}/placements/{}?key={}&campaign_id={}&customer_id={}",
            self.base_url,
            urlencoding::encode(placement.public_id()),
            urlencoding::encode(access_key),
            urlencoding::encode(campaign_id),
            urlencoding::encode(customer_id.unwrap_or_default()),
        );
        if let Some(bg) = placement.background_color() {
            url.push_str("&bg=");
            url.push_str(&urlencoding::encode(bg));
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_core::types::ScreenProps;

    fn placement(background: Option<&str>) -> Placement {
        Placement {
            path: "/invite".into(),
            id: "p1".into(),
            placement_id: Some("referrer".into()),
            is_empty: Some(false),
            screen_props: Some(ScreenProps {
                background_color: background.map(str::to_string),
                primary_color: Some("#123456".into()),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_background_color_encoded() {
        let url = PlacementUrlBuilder::new("https://app.example.com").build(
            &placement(Some("#FFFFFF")),
            "pk_test",
            "c1",
            Some("cust_9"),
        );
        assert_eq!(
            url,
            "https://app.example.com/placements/referrer?key=pk_test&campaign_id=c1&customer_id=cust_9&bg=%23FFFFFF"
        );
    }

    #[test]
    fn test_no_bg_without_background_color() {
        let url = PlacementUrlBuilder::new("https://app.example.com/").build(
            &placement(None),
            "pk_test",
            "c1",
            None,
        );
        assert_eq!(
            url,
            "https://app.example.com/placements/referrer?key=pk_test&campaign_id=c1&customer_id="
        );
        assert!(!url.contains("bg="));
        // Other styling never leaks into the URL.
        assert!(!url.contains("123456"));
    }

    #[test]
    fn test_falls_back_to_generic_id_in_path() {
        let mut p = placement(None);
        p.placement_id = None;
        let url = PlacementUrlBuilder::new("https://ui").build(&p, "k", "c", Some("u"));
        assert!(url.starts_with("https://ui/placements/p1?"));
    }

    #[test]
    fn test_parameter_values_are_escaped() {
        let url = PlacementUrlBuilder::new("https://ui").build(
            &placement(Some("rgb(0, 0, 0)")),
            "key&x=1",
            "c 1",
            Some("u"),
        );
        assert_eq!(
            url,
            "https://ui/placements/referrer?key=key%26x%3D1&campaign_id=c%201&customer_id=u&bg=rgb%280%2C%200%2C%200%29"
        );
    }
}
