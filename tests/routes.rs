use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use thebook_app::{modules::posts::urls::Route, utils::LocalMediaStorage, AppState};
use thebook_db::{GroupId, MemoryStore, NewBook, NewGroup, NewPost, NewUser, Repository, UserId};
use thebook_kernel::settings::Settings;
use tower::ServiceExt;

struct Site {
    state: AppState,
    router: Router,
    media_root: PathBuf,
}

impl Drop for Site {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.media_root).ok();
    }
}

fn site() -> Site {
    let media_root = std::env::temp_dir().join(format!("thebook-routes-{}", uuid::Uuid::new_v4()));
    let mut settings = Settings::default();
    settings.auth.dev_login = true;
    settings.pagination.page_size = 2;
    settings.media.root = media_root.to_string_lossy().into_owned();

    let media = LocalMediaStorage::from_settings(&settings.media);
    let state = AppState::new(Arc::new(MemoryStore::new()), Arc::new(media), settings);
    let router = thebook_app::router(&state);
    Site {
        state,
        router,
        media_root,
    }
}

impl Site {
    async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn post_form(&self, uri: &str, body: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    /// Sign in through the dev login form and return the session cookie.
    async fn login(&self, username: &str) -> String {
        let response = self
            .post_form("/auth/login/", &format!("username={}&next=/", username), None)
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("login sets a session cookie")
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    fn user(&self, username: &str) -> UserId {
        match self.state.store.user_by_username(username) {
            Ok(user) => user.id,
            Err(_) => self.state.store.create_user(NewUser::named(username)).unwrap().id,
        }
    }

    fn group(&self, slug: &str) -> GroupId {
        self.state
            .store
            .create_group(NewGroup {
                title: slug.to_uppercase(),
                slug: slug.to_string(),
                description: String::new(),
            })
            .unwrap()
            .id
    }

    fn post(&self, author: UserId, group: Option<GroupId>, text: &str) -> i64 {
        self.state
            .store
            .create_post(NewPost {
                text: text.to_string(),
                author,
                group,
                book: None,
                image: None,
            })
            .unwrap()
            .id
    }
}

fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}

fn login_next(location: &str) -> String {
    let (base, query) = location.split_once('?').unwrap();
    assert_eq!(base, "/auth/login/");
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).unwrap();
    pairs
        .into_iter()
        .find(|(k, _)| k == "next")
        .map(|(_, v)| v)
        .unwrap()
}

async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn health_check_and_request_id() {
    let site = site();
    let response = site.get("/healthz", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test]
async fn anonymous_pages_render() {
    let site = site();
    let alice = site.user("alice");
    let group = site.group("poetry");
    let post = site.post(alice, Some(group), "First verse");

    for uri in [
        "/".to_string(),
        "/group/poetry/".to_string(),
        "/profile/alice/".to_string(),
        format!("/posts/{}/", post),
        "/books/".to_string(),
    ] {
        let response = site.get(&uri, None).await;
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
    }

    let body = body_text(site.get("/", None).await).await;
    assert!(body.contains("First verse"));
    assert!(body.contains("Sign in"));
}

#[tokio::test]
async fn login_guard_covers_exactly_the_protected_routes() {
    let site = site();
    let alice = site.user("alice");
    site.group("poetry");
    let post = site.post(alice, None, "Guarded post");
    let book = site
        .state
        .store
        .create_book(NewBook {
            title: "Dune".to_string(),
            author_book: "Frank Herbert".to_string(),
            description: String::new(),
            image: None,
            created_by: Some(alice),
        })
        .unwrap()
        .id;

    for route in Route::ALL {
        let uri = route
            .pattern()
            .replace("{slug}", "poetry")
            .replace("{username}", "alice")
            .replace("{post_id}", &post.to_string())
            .replace("{book_id}", &book.to_string());
        let response = if route == Route::AddComment {
            site.post_form(&uri, "text=hi", None).await
        } else {
            site.get(&uri, None).await
        };

        if route.requires_login() {
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", route.name());
            assert_eq!(login_next(location(&response)), uri, "{}", route.name());
        } else {
            assert_eq!(response.status(), StatusCode::OK, "{}", route.name());
        }
    }
}

#[tokio::test]
async fn anonymous_create_redirects_to_login() {
    let site = site();

    let response = site.get("/create/", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(login_next(location(&response)), "/create/");

    let response = site.post_form("/create/", "text=sneaky", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(site.state.store.posts().unwrap().is_empty());
}

#[tokio::test]
async fn anonymous_comment_redirects_to_login() {
    let site = site();
    let alice = site.user("alice");
    let post = site.post(alice, None, "Quiet post");

    let uri = format!("/posts/{}/comment/", post);
    let response = site.post_form(&uri, "text=hello", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(login_next(location(&response)), uri);
    assert_eq!(site.state.store.comment_count(post).unwrap(), 0);
}

#[tokio::test]
async fn unknown_records_and_bad_params_are_404() {
    let site = site();
    site.user("alice");

    for uri in [
        "/posts/999/",
        "/posts/abc/",
        "/books/999/",
        "/books/abc/",
        "/group/missing/",
        "/profile/nobody/",
        "/nowhere/",
    ] {
        let response = site.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
    }
}

#[tokio::test]
async fn signed_in_user_creates_post() {
    let site = site();
    let cookie = site.login("alice").await;

    let form = site.get("/create/", Some(&cookie)).await;
    assert_eq!(form.status(), StatusCode::OK);

    let response = site
        .post_form("/create/", "text=Written+by+alice&group=&book=", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile/alice/");

    let posts = site.state.store.posts().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].text, "Written by alice");
    assert_eq!(posts[0].author, site.user("alice"));

    let profile = body_text(site.get("/profile/alice/", Some(&cookie)).await).await;
    assert!(profile.contains("Written by alice"));
}

#[tokio::test]
async fn invalid_post_rerenders_with_200() {
    let site = site();
    let cookie = site.login("alice").await;

    let response = site.post_form("/create/", "text=", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("This field is required."));
}

#[tokio::test]
async fn multipart_upload_is_stored_and_served() {
    let site = site();
    let cookie = site.login("alice").await;

    let image_bytes = b"\x89PNG\r\n\x1a\nPNGDATA";
    let mut body = concat!(
        "--XYZ\r\n",
        "Content-Disposition: form-data; name=\"text\"\r\n\r\n",
        "Picture post\r\n",
        "--XYZ\r\n",
        "Content-Disposition: form-data; name=\"image\"; filename=\"cat.png\"\r\n",
        "Content-Type: image/png\r\n\r\n",
    )
    .as_bytes()
    .to_vec();
    body.extend_from_slice(image_bytes);
    body.extend_from_slice(b"\r\n--XYZ--\r\n");
    let request = Request::builder()
        .method("POST")
        .uri("/create/")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XYZ")
        .header(header::COOKIE, &cookie)
        .body(Body::from(body))
        .unwrap();
    let response = site.send(request).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let post = site.state.store.posts().unwrap().remove(0);
    let image = post.image.expect("image stored");
    assert!(image.starts_with("posts/"));

    let served = site.get(&format!("/media/{}", image), None).await;
    assert_eq!(served.status(), StatusCode::OK);
    assert_eq!(body_bytes(served).await, image_bytes.to_vec());
}

#[tokio::test]
async fn script_disguised_as_png_is_rejected() {
    let site = site();
    let cookie = site.login("alice").await;

    let body = concat!(
        "--XYZ\r\n",
        "Content-Disposition: form-data; name=\"text\"\r\n\r\n",
        "Not a picture\r\n",
        "--XYZ\r\n",
        "Content-Disposition: form-data; name=\"image\"; filename=\"cat.png\"\r\n",
        "Content-Type: image/png\r\n\r\n",
        "#!/bin/sh\necho hi\r\n",
        "--XYZ--\r\n",
    );
    let request = Request::builder()
        .method("POST")
        .uri("/create/")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XYZ")
        .header(header::COOKIE, &cookie)
        .body(Body::from(body))
        .unwrap();
    let response = site.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Upload a valid image."));
    assert!(site.state.store.posts().unwrap().is_empty());
}

#[tokio::test]
async fn only_the_author_can_edit() {
    let site = site();
    let alice = site.user("alice");
    let post = site.post(alice, None, "Original");
    let bob_cookie = site.login("bob").await;

    let uri = format!("/posts/{}/edit/", post);
    let response = site.post_form(&uri, "text=Hijacked", Some(&bob_cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}/", post));
    assert_eq!(site.state.store.post(post).unwrap().text, "Original");

    let alice_cookie = site.login("alice").await;
    let response = site.post_form(&uri, "text=Revised", Some(&alice_cookie)).await;
    assert_eq!(location(&response), format!("/posts/{}/", post));
    assert_eq!(site.state.store.post(post).unwrap().text, "Revised");
}

#[tokio::test]
async fn comment_increments_count() {
    let site = site();
    let alice = site.user("alice");
    let post = site.post(alice, None, "Talk to me");
    let cookie = site.login("bob").await;

    let uri = format!("/posts/{}/comment/", post);
    let response = site.post_form(&uri, "text=Hello+there", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}/", post));

    assert_eq!(site.state.store.comment_count(post).unwrap(), 1);
    let comment = site.state.store.comments_for_post(post).unwrap().remove(0);
    assert_eq!(comment.author, site.user("bob"));
    assert_eq!(comment.post, Some(post));

    let detail = body_text(site.get(&format!("/posts/{}/", post), None).await).await;
    assert!(detail.contains("Hello there"));
}

#[tokio::test]
async fn group_pages_paginate_newest_first() {
    let site = site();
    let alice = site.user("alice");
    let group = site.group("poetry");
    site.post(alice, Some(group), "oldest entry");
    site.post(alice, Some(group), "middle entry");
    site.post(alice, Some(group), "newest entry");

    let first = body_text(site.get("/group/poetry/", None).await).await;
    let newest = first.find("newest entry").expect("newest on first page");
    let middle = first.find("middle entry").expect("middle on first page");
    assert!(newest < middle);
    assert!(!first.contains("oldest entry"));

    let second = body_text(site.get("/group/poetry/?page=2", None).await).await;
    assert!(second.contains("oldest entry"));
    assert!(!second.contains("newest entry"));

    let invalid = body_text(site.get("/group/poetry/?page=abc", None).await).await;
    assert!(invalid.contains("newest entry"));

    let beyond = site.get("/group/poetry/?page=9", None).await;
    assert_eq!(beyond.status(), StatusCode::OK);
    let beyond = body_text(beyond).await;
    assert!(!beyond.contains("entry"));
}

#[tokio::test]
async fn deleting_a_group_keeps_its_posts() {
    let site = site();
    let alice = site.user("alice");
    let group = site.group("poetry");
    let post = site.post(alice, Some(group), "Survivor");

    site.state.store.delete_group(group).unwrap();

    assert_eq!(site.state.store.post(post).unwrap().group, None);
    assert_eq!(site.get("/group/poetry/", None).await.status(), StatusCode::NOT_FOUND);
    assert!(body_text(site.get("/", None).await).await.contains("Survivor"));
    assert_eq!(
        site.get(&format!("/posts/{}/", post), None).await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn logout_ends_the_session() {
    let site = site();
    let cookie = site.login("alice").await;
    assert_eq!(site.get("/create/", Some(&cookie)).await.status(), StatusCode::OK);

    let response = site.post_form("/auth/logout/", "", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        site.get("/create/", Some(&cookie)).await.status(),
        StatusCode::SEE_OTHER
    );
}
