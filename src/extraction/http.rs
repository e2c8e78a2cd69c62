use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::warn;

use super::{
    DishDescriptor, Extraction, ExtractionRequest, MealAnalysis, NutritionExtractionService,
    ResolvedNutrition, ServiceError,
};
use crate::nutrition::{MealType, NutritionPayload};
use crate::sessions::DishResult;

// --- wire types ---

#[derive(Debug, Serialize)]
struct DishesRequest<'a> {
    text: &'a str,
    #[serde(with = "time::serde::rfc3339")]
    local_now: OffsetDateTime,
    want_meal_time: bool,
    want_meal_type: bool,
}

#[derive(Debug, Deserialize)]
struct DishesResponse {
    dishes: Vec<WireDish>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    consumed_at: Option<OffsetDateTime>,
    #[serde(default)]
    meal_type: Option<MealType>,
}

#[derive(Debug, Deserialize)]
struct WireDish {
    name: String,
    #[serde(default)]
    serving_size: Option<String>,
    #[serde(default)]
    meal_type: Option<MealType>,
}

#[derive(Debug, Serialize)]
struct NutritionRequest<'a> {
    description: &'a str,
    serving_size: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct NutritionResponse {
    nutrition: HashMap<String, Option<f64>>,
    confidence: f64,
}

#[derive(Debug, Serialize)]
struct AnalysisRequest<'a> {
    dishes: Vec<AnalysisDish<'a>>,
}

#[derive(Debug, Serialize)]
struct AnalysisDish<'a> {
    description: &'a str,
    serving_size: Option<&'a str>,
    nutrition: HashMap<&'static str, f64>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// JSON client for a remote nutrition intelligence service.
#[derive(Debug, Clone)]
pub struct HttpExtractionService {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpExtractionService {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, ServiceError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or(body);
            warn!(%url, status = status.as_u16(), %message, "extraction service error");
            return Err(match status {
                StatusCode::SERVICE_UNAVAILABLE | StatusCode::TOO_MANY_REQUESTS => {
                    ServiceError::Unavailable(message)
                }
                _ => ServiceError::Rejected {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ServiceError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl NutritionExtractionService for HttpExtractionService {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn extract_dishes(
        &self,
        request: &ExtractionRequest,
    ) -> Result<Extraction, ServiceError> {
        let body = DishesRequest {
            text: &request.text,
            local_now: request.local_now,
            want_meal_time: true,
            want_meal_type: true,
        };
        let res: DishesResponse = self.post("/dishes", &body).await?;
        let dishes = res
            .dishes
            .into_iter()
            .filter(|d| !d.name.trim().is_empty())
            .map(|d| DishDescriptor {
                name: d.name.trim().to_string(),
                serving_hint: d.serving_size,
                meal_type: d.meal_type,
            })
            .collect();
        Ok(Extraction {
            dishes,
            consumed_at: res.consumed_at,
            meal_type: res.meal_type,
        })
    }

    async fn resolve_nutrition(
        &self,
        dish: &DishDescriptor,
        serving_hint: Option<&str>,
    ) -> Result<ResolvedNutrition, ServiceError> {
        let body = NutritionRequest {
            description: &dish.name,
            serving_size: serving_hint,
        };
        let res: NutritionResponse = self.post("/nutrition", &body).await?;
        let payload =
            NutritionPayload::from_flat(res.nutrition.iter().map(|(k, v)| (k.as_str(), *v)));
        Ok(ResolvedNutrition {
            payload,
            confidence: super::bounded_confidence(res.confidence),
        })
    }

    async fn analyze_meal(&self, dishes: &[DishResult]) -> Result<MealAnalysis, ServiceError> {
        let body = AnalysisRequest {
            dishes: dishes
                .iter()
                .map(|d| AnalysisDish {
                    description: &d.description,
                    serving_size: d.serving_size.as_deref(),
                    nutrition: d.nutrition.iter().map(|(n, v)| (n.key(), v)).collect(),
                })
                .collect(),
        };
        self.post("/analysis", &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::Nutrient;
    use axum::{http::StatusCode as AxumStatus, routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(base: &str) -> HttpExtractionService {
        HttpExtractionService::new(base, Some("k".into()), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn resolves_flat_nutrition_map() {
        let app = Router::new().route(
            "/nutrition",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["description"], "banana");
                Json(json!({
                    "nutrition": {
                        "calories_kcal": 105.0,
                        "protein_g": 1.3,
                        "vitamin_c_mg": null,
                        "unknown_thing": 4.0
                    },
                    "confidence": 1.4
                }))
            }),
        );
        let base = serve(app).await;
        let out = client(&base)
            .resolve_nutrition(&DishDescriptor::new("banana"), Some("1"))
            .await
            .unwrap();
        assert_eq!(out.payload.calories(), 105.0);
        assert_eq!(out.payload.get(Nutrient::Protein), Some(1.3));
        assert_eq!(out.payload.get(Nutrient::VitaminC), None);
        assert_eq!(out.confidence, 1.0);
    }

    #[tokio::test]
    async fn extracts_dishes_and_drops_blank_names() {
        let app = Router::new().route(
            "/dishes",
            post(|| async {
                Json(json!({
                    "dishes": [
                        {"name": "oatmeal", "serving_size": "2 cups"},
                        {"name": "  "}
                    ],
                    "consumed_at": "2024-05-10T08:00:00+02:00",
                    "meal_type": "breakfast"
                }))
            }),
        );
        let base = serve(app).await;
        let request = ExtractionRequest {
            text: "2 cups of oatmeal".into(),
            local_now: OffsetDateTime::now_utc(),
        };
        let out = client(&base).extract_dishes(&request).await.unwrap();
        assert_eq!(out.dishes, vec![DishDescriptor::new("oatmeal").serving("2 cups")]);
        assert_eq!(out.meal_type, Some(MealType::Breakfast));
        assert_eq!(out.consumed_at.map(|t| t.hour()), Some(8));
    }

    #[tokio::test]
    async fn maps_unavailable_and_rejected() {
        let app = Router::new()
            .route(
                "/nutrition",
                post(|| async { (AxumStatus::SERVICE_UNAVAILABLE, "busy") }),
            )
            .route(
                "/analysis",
                post(|| async {
                    (
                        AxumStatus::BAD_REQUEST,
                        Json(json!({"message": "no dishes"})),
                    )
                }),
            );
        let base = serve(app).await;
        let c = client(&base);
        let r = c.resolve_nutrition(&DishDescriptor::new("rice"), None).await;
        assert!(matches!(r, Err(ServiceError::Unavailable(m)) if m == "busy"));
        let r = c.analyze_meal(&[]).await;
        assert!(
            matches!(r, Err(ServiceError::Rejected { status: 400, message }) if message == "no dishes")
        );
    }

    #[tokio::test]
    async fn malformed_body_is_reported() {
        let app = Router::new().route("/analysis", post(|| async { "not json" }));
        let base = serve(app).await;
        let r = client(&base).analyze_meal(&[]).await;
        assert!(matches!(r, Err(ServiceError::Malformed(_))));
    }
}
