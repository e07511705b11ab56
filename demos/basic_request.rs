//! Basic example demonstrating the fluent request builder.
//!
//! This example shows how to:
//! - Create a client with a base URL and default headers
//! - Fetch text and JSON bodies
//! - Send a JSON body with status-gated retries
//! - Decode an error shape when the status is not the expected one
//!
//! Run with: `cargo run --example basic_request`

use chainreq::{Client, Error, Outcome};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct NewPost {
    title: String,
    body: String,
    #[serde(rename = "userId")]
    user_id: u32,
}

#[derive(Debug, Deserialize)]
struct Empty {}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("chainreq=debug,basic_request=info")
        .init();

    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .default_header("User-Agent", "chainreq-demo/0.1")?
        .build()?;

    println!("=== GET as JSON ===");
    let post: Post = client.get("/posts/1").json().await?;
    println!("Post {}: {}", post.id, post.title);

    println!("\n=== POST with retries ===");
    let new_post = NewPost {
        title: "Hello".to_string(),
        body: "Sent with chainreq".to_string(),
        user_id: 1,
    };
    let mut response = client
        .post("/posts")
        .with_json(&new_post)
        .with_expected_status(201)
        .with_retry(2)
        .send()
        .await?;
    println!(
        "Status {} after {} attempt(s)",
        response.status(),
        response.attempts()
    );
    println!("Body: {}", response.text().await?);
    response.close();

    println!("\n=== Expected vs unexpected status ===");
    match client
        .get("/posts/999999")
        .with_expected_status(200)
        .json_with_error::<Post, Empty>()
        .await?
    {
        Outcome::Expected(Ok(post)) => println!("Found: {}", post.title),
        Outcome::Expected(Err(e)) => println!("Found, but unreadable: {}", e),
        Outcome::Unexpected(_) => println!("Post not found"),
    }

    Ok(())
}
