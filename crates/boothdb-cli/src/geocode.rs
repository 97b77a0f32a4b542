//! `geocode` command handler.

use boothdb_core::{AppConfig, GeocodeQuery};
use boothdb_geocode::{CascadeOutcome, GeocodeCascade, TierOutcome};

pub(crate) async fn run_geocode(config: &AppConfig, query: &GeocodeQuery) -> anyhow::Result<()> {
    let cascade = GeocodeCascade::from_config(config)?;
    let tiers: Vec<String> = cascade.tiers().iter().map(ToString::to_string).collect();
    println!("tiers: {}", tiers.join(" -> "));

    let outcome = cascade.resolve(query).await;
    for line in describe(&outcome) {
        println!("{line}");
    }

    if outcome.result.is_none() {
        anyhow::bail!("could not geocode '{}'", query.full_address());
    }
    Ok(())
}

fn describe(outcome: &CascadeOutcome) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(reason) = &outcome.input_rejected {
        lines.push(format!("rejected before lookup: {reason}"));
        return lines;
    }

    for attempt in &outcome.attempts {
        let detail = match &attempt.outcome {
            TierOutcome::Accepted(confidence) => format!("accepted ({confidence})"),
            TierOutcome::HeldAsFallback => "low confidence, held as fallback".to_string(),
            TierOutcome::NoResult => "no result".to_string(),
            TierOutcome::Rejected(reason) => format!("rejected: {reason}"),
            TierOutcome::Failed(error) => format!("failed: {error}"),
        };
        lines.push(format!("  {:<10} {detail}", attempt.provider.as_str()));
    }

    if let Some(result) = &outcome.result {
        lines.push(format!(
            "{:.6}, {:.6}  {}  [{} via {}, score {:.2}]",
            result.latitude,
            result.longitude,
            result.display_address,
            result.confidence,
            result.provider,
            result.match_score,
        ));
        if result.needs_review {
            lines.push(format!(
                "needs review: {}",
                result.validation_issues.join("; ")
            ));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use boothdb_core::{GeocodeConfidence, GeocodeProviderKind, GeocodeResult};
    use boothdb_geocode::{IncompleteAddress, TierAttempt};

    use super::*;

    #[test]
    fn describe_reports_rejected_input_only() {
        let outcome = CascadeOutcome {
            input_rejected: Some(IncompleteAddress::NoStreetNumber),
            ..CascadeOutcome::default()
        };

        assert_eq!(
            describe(&outcome),
            vec!["rejected before lookup: address has no street number".to_string()]
        );
    }

    #[test]
    fn describe_lists_each_tier_then_the_result() {
        let outcome = CascadeOutcome {
            result: Some(GeocodeResult {
                latitude: 40.7456,
                longitude: -73.9882,
                display_address: "20 W 29th St, New York, NY".to_string(),
                provider: GeocodeProviderKind::Mapbox,
                confidence: GeocodeConfidence::High,
                match_score: 0.9,
                validation_issues: Vec::new(),
                needs_review: false,
            }),
            input_rejected: None,
            attempts: vec![
                TierAttempt {
                    provider: GeocodeProviderKind::Nominatim,
                    outcome: TierOutcome::NoResult,
                },
                TierAttempt {
                    provider: GeocodeProviderKind::Mapbox,
                    outcome: TierOutcome::Accepted(GeocodeConfidence::High),
                },
            ],
        };

        let lines = describe(&outcome);

        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("no result"));
        assert!(lines[1].contains("accepted (high)"));
        assert!(lines[2].starts_with("40.745600, -73.988200"));
    }
}
