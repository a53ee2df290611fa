use crate::{ErrorRecord, ErrorResponse, FetchError};

#[test]
fn test_description_wins_over_message() {
    let error = FetchError::new("Request failed with status code 400")
        .with_response(ErrorResponse::new(vec![ErrorRecord::described("bad input")]));
    assert_eq!(error.normalized_message(), Some("bad input".to_string()));
}

#[test]
fn test_description_without_message() {
    let error = FetchError::empty().with_response(ErrorResponse::new(vec![
        ErrorRecord::described("error message from API"),
    ]));
    assert_eq!(
        error.normalized_message(),
        Some("error message from API".to_string())
    );
}

#[test]
fn test_message_when_no_response() {
    let error = FetchError::new("test message");
    assert_eq!(error.normalized_message(), Some("test message".to_string()));
}

#[test]
fn test_message_when_response_data_is_empty() {
    let error = FetchError::new("Y").with_response(ErrorResponse::default());
    assert_eq!(error.normalized_message(), Some("Y".to_string()));
}

#[test]
fn test_only_first_record_is_considered() {
    let error = FetchError::new("Y").with_response(ErrorResponse::new(vec![
        ErrorRecord {
            code: Some("E42".to_string()),
            description: None,
        },
        ErrorRecord::described("second"),
    ]));
    assert_eq!(error.normalized_message(), Some("Y".to_string()));
}

#[test]
fn test_empty_description_falls_back_to_message() {
    let error = FetchError::new("Y")
        .with_response(ErrorResponse::new(vec![ErrorRecord::described("")]));
    assert_eq!(error.normalized_message(), Some("Y".to_string()));
}

#[test]
fn test_absent_message_is_kept_absent() {
    assert_eq!(FetchError::empty().normalized_message(), None);

    let error = FetchError::empty().with_response(ErrorResponse::default());
    assert_eq!(error.normalized_message(), None);
}

#[test]
fn test_display() {
    assert_eq!(FetchError::new("boom").to_string(), "boom");
    assert_eq!(FetchError::empty().to_string(), "fetch failed");
}

#[test]
fn test_kinds() {
    assert!(FetchError::new("boom").is_fetch());
    assert!(FetchError::transform("boom").is_transform());
    assert!(FetchError::panicked(Box::new("boom")).is_panicked());
    assert_eq!(
        FetchError::panicked(Box::new(String::from("owned"))).message(),
        Some("owned")
    );
    assert_eq!(
        FetchError::panicked(Box::new(7_u8)).message(),
        Some("fetch cycle panicked")
    );
}

#[test]
fn test_from_std_error() {
    let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
    let error = FetchError::from_error(io);
    assert_eq!(error.message(), Some("disk on fire"));
    assert!(error.response().is_none());
}

#[cfg(feature = "serde")]
#[test]
fn test_response_from_json() {
    let response =
        ErrorResponse::from_json(r#"{"data":[{"description":"bad input","code":"E1","field":"x"}]}"#)
            .unwrap();
    assert_eq!(response.first_description(), Some("bad input"));
    assert_eq!(response.data[0].code.as_deref(), Some("E1"));

    let response = ErrorResponse::from_json("{}").unwrap();
    assert!(response.data.is_empty());
}
