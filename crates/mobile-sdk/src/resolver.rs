//! Checkpoint and placement lookup.
//!
//! Placements are matched on their public `placementId` first, then on the
//! generic `id` for legacy callers. Matching is exact and case-sensitive.

use campaign_core::types::{Campaign, Checkpoint, Placement};

pub struct PlacementResolver;

impl PlacementResolver {
    pub fn resolve<'a>(campaign: &'a Campaign, placement_id: &str) -> Option<&'a Placement> {
        let pages = &campaign.campaign_pages;
        pages
            .iter()
            .find(|p| p.placement_id.as_deref() == Some(placement_id))
            .or_else(|| pages.iter().find(|p| p.id == placement_id))
    }

    /// First checkpoint carrying `name`.
    pub fn find_checkpoint<'a>(checkpoints: &'a [Checkpoint], name: &str) -> Option<&'a Checkpoint> {
        checkpoints.iter().find(|c| c.checkpoint_name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_core::types::{CheckpointTrigger, Environment};
    use chrono::Utc;

    fn page(id: &str, placement_id: Option<&str>) -> Placement {
        Placement {
            path: format!("/{id}"),
            id: id.to_string(),
            placement_id: placement_id.map(str::to_string),
            is_empty: None,
            screen_props: None,
        }
    }

    fn campaign(pages: Vec<Placement>) -> Campaign {
        Campaign {
            id: "c1".into(),
            name: "Referral".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            environment: Environment::Test,
            is_live: true,
            campaign_pages: pages,
        }
    }

    #[test]
    fn test_placement_id_wins_over_generic_id() {
        // "referrer" is the generic id of the first page and the placement id of the second.
        let c = campaign(vec![page("referrer", None), page("p2", Some("referrer"))]);
        let found = PlacementResolver::resolve(&c, "referrer").unwrap();
        assert_eq!(found.id, "p2");
        // Deterministic on repeat.
        assert_eq!(PlacementResolver::resolve(&c, "referrer").unwrap().id, "p2");
    }

    #[test]
    fn test_falls_back_to_generic_id() {
        let c = campaign(vec![page("p1", Some("invitee")), page("p2", None)]);
        assert_eq!(PlacementResolver::resolve(&c, "p2").unwrap().id, "p2");
        assert_eq!(PlacementResolver::resolve(&c, "p1").unwrap().id, "p1");
    }

    #[test]
    fn test_exact_case_sensitive_match() {
        let c = campaign(vec![page("p1", Some("Referrer"))]);
        assert!(PlacementResolver::resolve(&c, "referrer").is_none());
        assert!(PlacementResolver::resolve(&c, "Refer").is_none());
        assert!(PlacementResolver::resolve(&c, "").is_none());
    }

    #[test]
    fn test_find_checkpoint_by_name() {
        let now = Utc::now();
        let checkpoints = vec![Checkpoint {
            id: "cp1".into(),
            campaign_id: "c1".into(),
            checkpoint_name: "cta_clicked".into(),
            trigger: CheckpointTrigger::Placement,
            placement_id: Some("referrer".into()),
            created_at: now,
            updated_at: now,
        }];
        assert_eq!(
            PlacementResolver::find_checkpoint(&checkpoints, "cta_clicked").unwrap().id,
            "cp1"
        );
        assert!(PlacementResolver::find_checkpoint(&checkpoints, "CTA_CLICKED").is_none());
    }
}
