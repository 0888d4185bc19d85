use async_trait::async_trait;
use kinolern_core::{Candidate, ItemIndex, Preference, RecommendRequest, RecommendResponse};
use kinolern_session::{RecommendationService, ServiceError, Session};
use serde_json::json;
use std::collections::HashSet;

/// Offers the five lowest ids that are neither excluded nor already rated.
struct Catalogue {
    size: u64,
}

#[async_trait]
impl RecommendationService for Catalogue {
    async fn recommend(&self, request: &RecommendRequest) -> Result<RecommendResponse, ServiceError> {
        let mut taken: HashSet<ItemIndex> = request.exclude.iter().copied().collect();
        for round in &request.rounds {
            taken.extend(round.keys().copied());
        }
        let candidates = (0..self.size)
            .map(ItemIndex)
            .filter(|i| !taken.contains(i))
            .take(5)
            .map(|i| Candidate::new(i).with_metadata("title", json!(format!("Movie #{i}"))))
            .collect();
        Ok(RecommendResponse { candidates })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let service = Catalogue { size: 40 };
    let mut session = Session::new();

    session.initialize(&service).await?;
    session.set_feedback(ItemIndex(0), Preference::Like)?;
    session.set_feedback(ItemIndex(3), Preference::Dislike)?;
    session.advance_round(&service).await?;
    session.expand_round(&service).await?;
    session.refresh_round(&service, true).await?;

    println!("{}", serde_json::to_string_pretty(&session.view())?);
    Ok(())
}
