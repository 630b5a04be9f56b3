use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use base64::Engine;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use image_classifier::{
    config::ClassifyConfig,
    models::{ClassLabels, ClassificationModel, ModelHandle},
    web::{create_app, AppState},
    Config, Result,
};
use ndarray::ArrayView4;
use serde_json::Value;
use std::io::Cursor;
use tower::ServiceExt;

const BOUNDARY: &str = "X-CLASSIFIER-TEST-BOUNDARY";

/// 通道均值作为前三个类别的分数，其余为常数
struct ChannelMeanModel;

impl ClassificationModel for ChannelMeanModel {
    fn infer(&self, input: ArrayView4<'_, f32>) -> Result<Vec<f32>> {
        let n = (input.len() / 3) as f32;
        let mut sums = [0.0f32; 3];
        for (i, v) in input.iter().enumerate() {
            sums[i % 3] += v;
        }
        Ok(vec![sums[0] / n, sums[1] / n, sums[2] / n, 0.05, 0.04])
    }

    fn name(&self) -> &str {
        "channel-mean"
    }
}

fn app() -> Router {
    let config = Config::new("127.0.0.1:0".into(), "models".into(), false).unwrap();
    let models = ModelHandle::new(
        ChannelMeanModel,
        ClassLabels::from_names(["red", "green", "blue", "gray", "black"]),
        ClassifyConfig::default(),
    );
    create_app(AppState::new(config, models))
}

fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

fn multipart_body(file: &[u8], content_type: &str, extra: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in extra {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"upload\"\r\nContent-Type: {}\r\n\r\n",
            BOUNDARY, content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(file);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/classify/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn upload_returns_three_sorted_predictions_with_preview() {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(500, 500, Rgb([240, 120, 10])));
    let body = multipart_body(&encode(&image, ImageFormat::Png), "image/png", &[]);

    let response = app().oneshot(upload_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["success"], true);

    let predictions = json["data"]["predictions"].as_array().unwrap();
    assert_eq!(predictions.len(), 3);
    assert_eq!(predictions[0]["label"], "red");
    assert_eq!(predictions[1]["label"], "green");

    let scores: Vec<f64> = predictions.iter().map(|p| p["score"].as_f64().unwrap()).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
    assert!(predictions[0]["confidence_text"].as_str().unwrap().ends_with('%'));

    assert_eq!(json["data"]["preview"]["width"], 350);
    assert_eq!(json["data"]["preview"]["height"], 350);
}

#[tokio::test]
async fn rgba_upload_matches_rgb_upload() {
    let rgba = RgbaImage::from_fn(64, 32, |x, y| Rgba([x as u8 * 3, y as u8 * 5, 77, 9]));
    let rgb = RgbImage::from_fn(64, 32, |x, y| {
        let p = rgba.get_pixel(x, y);
        Rgb([p[0], p[1], p[2]])
    });

    let mut results = Vec::new();
    for image in [DynamicImage::ImageRgba8(rgba), DynamicImage::ImageRgb8(rgb)] {
        let body = multipart_body(
            &encode(&image, ImageFormat::Png),
            "image/png",
            &[("include_preview", "false")],
        );
        let response = app().oneshot(upload_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert!(json["data"].get("preview").is_none());
        results.push(json["data"]["predictions"].clone());
    }

    assert_eq!(results[0], results[1]);
}

#[tokio::test]
async fn top_k_field_is_honored() {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(30, 30, Rgb([0, 0, 255])));
    let body = multipart_body(&encode(&image, ImageFormat::Jpeg), "image/jpeg", &[("top_k", "1")]);

    let json = json_body(app().oneshot(upload_request(body)).await.unwrap()).await;
    let predictions = json["data"]["predictions"].as_array().unwrap();
    assert_eq!(predictions.len(), 1);
    assert_eq!(predictions[0]["label"], "blue");
}

#[tokio::test]
async fn missing_file_is_bad_request() {
    let body = format!(
        "--{}\r\nContent-Disposition: form-data; name=\"top_k\"\r\n\r\n3\r\n--{}--\r\n",
        BOUNDARY, BOUNDARY
    );
    let response = app()
        .oneshot(upload_request(body.into_bytes()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn unrecognized_bytes_fail_to_decode() {
    let body = multipart_body(b"hello", "text/plain", &[]);
    let response = app().oneshot(upload_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["error"]["code"], "IMAGE_DECODE_ERROR");
}

#[tokio::test]
async fn declared_type_does_not_override_sniffing() {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(24, 24, Rgb([200, 10, 10])));
    let png = encode(&image, ImageFormat::Png);

    for declared in ["image/x-png", "image/webp", "text/plain"] {
        let body = multipart_body(&png, declared, &[]);
        let response = app().oneshot(upload_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "declared {}", declared);

        let json = json_body(response).await;
        assert_eq!(json["data"]["predictions"][0]["label"], "red");
    }
}

#[tokio::test]
async fn malformed_option_fields_are_bad_request() {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([5, 5, 5])));
    let png = encode(&image, ImageFormat::Png);

    for (name, value) in [("top_k", "abc"), ("top_k", "0"), ("include_preview", "maybe")] {
        let body = multipart_body(&png, "image/png", &[(name, value)]);
        let response = app().oneshot(upload_request(body)).await.unwrap();
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "{}={}",
            name,
            value
        );
        assert_eq!(json_body(response).await["error"]["code"], "INVALID_INPUT");
    }
}

#[tokio::test]
async fn multipart_text_output() {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([0, 0, 240])));
    let body = multipart_body(
        &encode(&image, ImageFormat::Png),
        "image/png",
        &[("output_format", "text")],
    );
    let response = app().oneshot(upload_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.starts_with("- blue: "));
    assert!(text.contains("% confidence"));
}

#[tokio::test]
async fn sniffed_bmp_is_unsupported_even_if_declared_png() {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([1, 1, 1])));
    let body = multipart_body(&encode(&image, ImageFormat::Bmp), "image/png", &[]);
    let response = app().oneshot(upload_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn json_base64_upload_and_text_output() {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 20, Rgb([10, 250, 10])));
    let b64 = base64::engine::general_purpose::STANDARD.encode(encode(&image, ImageFormat::Png));
    let request_body = serde_json::json!({ "image": b64, "output_format": "text" });

    let response = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/classify")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert_eq!(text.lines().count(), 3);
    assert!(text.starts_with("- green: "));
}

#[tokio::test]
async fn json_validation_rejects_empty_image() {
    let response = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/classify")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"image": "  "}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn request_id_header_is_echoed_in_envelope() {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([9, 9, 9])));
    let b64 = base64::engine::general_purpose::STANDARD.encode(encode(&image, ImageFormat::Png));

    let response = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/classify")
                .header(header::CONTENT_TYPE, "application/json")
                .header("X-Request-ID", "req-42")
                .body(Body::from(serde_json::json!({ "image": b64 }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let json = json_body(response).await;
    assert_eq!(json["request_id"], "req-42");
}

#[tokio::test]
async fn health_and_info_endpoints() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert_eq!(json_body(response).await["status"], "healthy");

    let response = app()
        .oneshot(Request::builder().uri("/api/info").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json["models"]["num_classes"], 5);
    assert_eq!(json["models"]["input_size"], 224);
    assert_eq!(json["models"]["layout"], "nhwc");
}

#[tokio::test]
async fn index_serves_upload_page() {
    let response = app()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("/classify/upload"));
}
