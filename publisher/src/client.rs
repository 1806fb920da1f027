use crate::event::{Event, EventType, Reading};
use reqwest::{Client, StatusCode};

/// What the ingestion endpoint said about one event.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Accepted,
    Rejected { status: StatusCode, body: String },
}

/// POSTs `event` as JSON. Only an HTTP 200 counts as accepted; transport
/// failures come back as `Err`. Nothing is retried.
pub async fn send_event(
    client: &Client,
    endpoint: &str,
    event: &Event,
) -> Result<Delivery, reqwest::Error> {
    let response = client.post(endpoint).json(event).send().await?;

    let status = response.status();
    if status == StatusCode::OK {
        return Ok(Delivery::Accepted);
    }

    let body = response.text().await.unwrap_or_default();
    Ok(Delivery::Rejected { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn event() -> Event {
        Event {
            device_id: "device-7".to_string(),
            event_type: EventType::Temperature,
            value: Reading::Float(42.5),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_accepted_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/prod/events"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({
                "device_id": "device-7",
                "event_type": "temperature",
                "value": 42.5,
                "timestamp": "2024-01-01T00:00:00Z"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"message": "Event processed successfully"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = format!("{}/prod/events", server.uri());
        let delivery = send_event(&Client::new(), &endpoint, &event()).await.unwrap();
        assert_eq!(delivery, Delivery::Accepted);
    }

    #[tokio::test]
    async fn test_rejected_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Invalid event data"))
            .mount(&server)
            .await;

        let delivery = send_event(&Client::new(), &server.uri(), &event()).await.unwrap();
        assert_eq!(
            delivery,
            Delivery::Rejected {
                status: StatusCode::BAD_REQUEST,
                body: "Invalid event data".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_non_200_success_is_not_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        let delivery = send_event(&Client::new(), &server.uri(), &event()).await.unwrap();
        assert!(matches!(delivery, Delivery::Rejected { status, .. } if status == StatusCode::ACCEPTED));
    }

    #[tokio::test]
    async fn test_transport_error() {
        // Nothing listens on port 9 of the loopback interface.
        let result = send_event(&Client::new(), "http://127.0.0.1:9/events", &event()).await;
        assert!(result.is_err());
    }
}
