//! Service-level tests against a real PostgreSQL database

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use librabook_server::{
    config::EmailConfig,
    error::{AppError, AppResult},
    repository::Repository,
    services::{
        email::{Mailer, OutgoingMail},
        Services,
    },
};
use sqlx::PgPool;

/// Keeps every message instead of delivering it
#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    fail: bool,
}

impl RecordingMailer {
    fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn last_to(&self, to: &str) -> Option<OutgoingMail> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|mail| mail.to == to)
            .cloned()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> AppResult<()> {
        if self.fail {
            return Err(AppError::EmailDeliveryFailed("relay refused".to_string()));
        }
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

fn services(pool: &PgPool, mailer: Arc<RecordingMailer>) -> Services {
    Services::with_mailer(Repository::new(pool.clone()), mailer, &EmailConfig::default()).unwrap()
}

/// Register, activate and log in; returns the live session token
async fn active_reader(services: &Services, email: &str) -> String {
    let registration = services
        .accounts
        .register(email, "reader", "secret")
        .await
        .unwrap();
    services.accounts.activate(&registration.confirmation).await.unwrap();
    registration.session_token
}

async fn insert_book(pool: &PgPool, name: &str) -> i32 {
    sqlx::query_scalar(
        "INSERT INTO books (book_name, book_author, book_genre, borrowed) VALUES ($1, 'Author', 'Genre', FALSE) RETURNING id",
    )
    .bind(name)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[sqlx::test(migrations = "./migrations")]
#[ignore] // Needs DATABASE_URL: cargo test -- --ignored
async fn duplicate_registration_is_rejected(pool: PgPool) {
    let services = services(&pool, Arc::new(RecordingMailer::default()));

    services
        .accounts
        .register("reader@example.com", "reader", "secret")
        .await
        .unwrap();

    let second = services
        .accounts
        .register("Reader@Example.com", "other", "secret")
        .await;
    assert!(matches!(second, Err(AppError::AlreadyExists(_))));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_table")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn registration_mails_activation_link(pool: PgPool) {
    let mailer = Arc::new(RecordingMailer::default());
    let services = services(&pool, mailer.clone());

    let registration = services
        .accounts
        .register("reader@example.com", "reader", "secret")
        .await
        .unwrap();

    let mail = mailer.last_to("reader@example.com").unwrap();
    assert_eq!(mail.subject, "LibraBook");
    assert!(mail
        .text
        .contains(&format!("http://localhost:8000/activate/{}", registration.confirmation)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn failed_confirmation_mail_leaves_no_account(pool: PgPool) {
    let services = services(&pool, Arc::new(RecordingMailer::failing()));

    let result = services
        .accounts
        .register("reader@example.com", "reader", "secret")
        .await;
    assert!(matches!(result, Err(AppError::EmailDeliveryFailed(_))));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_table")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

/// Never answers
struct StalledMailer;

#[async_trait]
impl Mailer for StalledMailer {
    async fn send(&self, _mail: OutgoingMail) -> AppResult<()> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(())
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn stalled_mail_transport_rolls_registration_back(pool: PgPool) {
    let config = EmailConfig {
        send_timeout_ms: 100,
        ..EmailConfig::default()
    };
    let services = Services::with_mailer(Repository::new(pool.clone()), Arc::new(StalledMailer), &config).unwrap();

    let result = services
        .accounts
        .register("reader@example.com", "reader", "secret")
        .await;
    assert!(matches!(result, Err(AppError::EmailDeliveryFailed(_))));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_table")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn activation_works_once(pool: PgPool) {
    let services = services(&pool, Arc::new(RecordingMailer::default()));

    let registration = services
        .accounts
        .register("reader@example.com", "reader", "secret")
        .await
        .unwrap();

    services.accounts.activate(&registration.confirmation).await.unwrap();

    let account = services
        .accounts
        .resolve_session(&registration.session_token)
        .await
        .unwrap();
    assert!(account.is_activated);

    let again = services.accounts.activate(&registration.confirmation).await;
    assert!(matches!(again, Err(AppError::NotFound(_))));

    let unknown = services.accounts.activate("no-such-link").await;
    assert!(matches!(unknown, Err(AppError::NotFound(_))));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn login_replaces_the_session(pool: PgPool) {
    let services = services(&pool, Arc::new(RecordingMailer::default()));
    let first_token = active_reader(&services, "reader@example.com").await;

    services
        .accounts
        .authenticate("reader@example.com", "secret", "second-token")
        .await
        .unwrap();

    assert!(services.accounts.resolve_session("second-token").await.is_ok());
    assert!(matches!(
        services.accounts.resolve_session(&first_token).await,
        Err(AppError::Unauthenticated(_))
    ));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn wrong_password_and_unknown_email(pool: PgPool) {
    let services = services(&pool, Arc::new(RecordingMailer::default()));
    let token = active_reader(&services, "reader@example.com").await;

    let wrong = services
        .accounts
        .authenticate("reader@example.com", "not-the-password", "t1")
        .await;
    assert!(matches!(wrong, Err(AppError::IncorrectPassword)));

    let unknown = services
        .accounts
        .authenticate("nobody@example.com", "secret", "t2")
        .await;
    assert!(matches!(unknown, Err(AppError::NotFound(_))));

    // failed attempts keep the existing session
    assert!(services.accounts.resolve_session(&token).await.is_ok());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn otp_logs_in_once(pool: PgPool) {
    let mailer = Arc::new(RecordingMailer::default());
    let services = services(&pool, mailer.clone());
    active_reader(&services, "reader@example.com").await;

    services.accounts.request_otp("reader@example.com").await.unwrap();

    let mail = mailer.last_to("reader@example.com").unwrap();
    let code = mail
        .text
        .split_whitespace()
        .find(|word| word.len() == 6 && word.chars().all(|c| c.is_ascii_digit()))
        .unwrap()
        .to_string();

    services
        .accounts
        .authenticate("reader@example.com", &code, "otp-session")
        .await
        .unwrap();
    assert!(services.accounts.resolve_session("otp-session").await.is_ok());

    let reused = services
        .accounts
        .authenticate("reader@example.com", &code, "otp-session-2")
        .await;
    assert!(matches!(reused, Err(AppError::IncorrectPassword)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn otp_for_unknown_email_still_succeeds(pool: PgPool) {
    let mailer = Arc::new(RecordingMailer::default());
    let services = services(&pool, mailer.clone());

    services.accounts.request_otp("nobody@example.com").await.unwrap();
    assert!(mailer.last_to("nobody@example.com").is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn change_password_checks_the_old_one(pool: PgPool) {
    let services = services(&pool, Arc::new(RecordingMailer::default()));
    active_reader(&services, "reader@example.com").await;

    let wrong = services
        .accounts
        .change_password("reader@example.com", "guess", "new-secret")
        .await;
    assert!(matches!(wrong, Err(AppError::IncorrectPassword)));

    services
        .accounts
        .change_password("reader@example.com", "secret", "new-secret")
        .await
        .unwrap();

    assert!(services
        .accounts
        .authenticate("reader@example.com", "new-secret", "t")
        .await
        .is_ok());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn borrow_and_return_round_trip(pool: PgPool) {
    let services = services(&pool, Arc::new(RecordingMailer::default()));
    let token = active_reader(&services, "reader@example.com").await;
    let book_id = insert_book(&pool, "Dune").await;

    services.catalog.borrow_book(&token, book_id).await.unwrap();

    let page = services.catalog.list_available_books(None, None, None).await.unwrap();
    assert!(page.books.iter().all(|b| b.id != book_id));

    let (username, borrowed) = services.catalog.list_borrowed_books(&token).await.unwrap();
    assert_eq!(username, "reader");
    assert_eq!(borrowed.len(), 1);
    assert_eq!(borrowed[0].book_name, "Dune");

    services.catalog.return_book(&token, "Dune").await.unwrap();

    let page = services.catalog.list_available_books(None, None, None).await.unwrap();
    assert!(page.books.iter().any(|b| b.id == book_id));

    let again = services.catalog.return_book(&token, "Dune").await;
    assert!(matches!(again, Err(AppError::NotBorrowedByUser(_))));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn double_borrow_keeps_one_borrowing(pool: PgPool) {
    let services = services(&pool, Arc::new(RecordingMailer::default()));
    let first = active_reader(&services, "first@example.com").await;
    let second = active_reader(&services, "second@example.com").await;
    let book_id = insert_book(&pool, "Dune").await;

    services.catalog.borrow_book(&first, book_id).await.unwrap();

    let result = services.catalog.borrow_book(&second, book_id).await;
    assert!(matches!(result, Err(AppError::AlreadyBorrowed(id)) if id == book_id));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM borrowings WHERE book_id = $1")
        .bind(book_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);

    let missing = services.catalog.borrow_book(&first, book_id + 1000).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn unactivated_account_cannot_borrow(pool: PgPool) {
    let services = services(&pool, Arc::new(RecordingMailer::default()));
    let registration = services
        .accounts
        .register("reader@example.com", "reader", "secret")
        .await
        .unwrap();
    let book_id = insert_book(&pool, "Dune").await;

    let result = services
        .catalog
        .borrow_book(&registration.session_token, book_id)
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn pagination_over_available_books(pool: PgPool) {
    let services = services(&pool, Arc::new(RecordingMailer::default()));
    for i in 0..25 {
        insert_book(&pool, &format!("Book {:02}", i)).await;
    }

    let first = services.catalog.list_available_books(None, None, None).await.unwrap();
    assert_eq!(first.total_pages, 3);
    assert_eq!(first.books.len(), 10);
    assert_eq!(first.current_page, 1);

    let third = services
        .catalog
        .list_available_books(None, None, Some("3"))
        .await
        .unwrap();
    assert_eq!(third.books.len(), 5);
    assert_eq!(third.next_page, 0);

    let past_end = services
        .catalog
        .list_available_books(None, None, Some("4"))
        .await
        .unwrap();
    assert!(past_end.books.is_empty());

    for garbage in ["abc", "0"] {
        let page = services
            .catalog
            .list_available_books(None, None, Some(garbage))
            .await
            .unwrap();
        assert_eq!(page.current_page, 1);
        assert_eq!(page.books.len(), 10);
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn largest_page_number_is_an_empty_page(pool: PgPool) {
    let services = services(&pool, Arc::new(RecordingMailer::default()));
    insert_book(&pool, "Dune").await;

    let page = services
        .catalog
        .list_available_books(None, None, Some("9223372036854775807"))
        .await
        .unwrap();
    assert!(page.books.is_empty());
    assert_eq!(page.total_pages, 1);
    assert_eq!(page.next_page, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn filter_and_sort(pool: PgPool) {
    let services = services(&pool, Arc::new(RecordingMailer::default()));
    insert_book(&pool, "Zebra tales").await;
    insert_book(&pool, "Apple orchards").await;
    insert_book(&pool, "100% cotton").await;

    let filtered = services
        .catalog
        .list_available_books(Some("APPLE"), None, None)
        .await
        .unwrap();
    assert_eq!(filtered.books.len(), 1);
    assert_eq!(filtered.total_pages, 1);

    // % is matched literally
    let percent = services
        .catalog
        .list_available_books(Some("0%"), None, None)
        .await
        .unwrap();
    assert_eq!(percent.books.len(), 1);

    let sorted = services
        .catalog
        .list_available_books(None, Some("name"), None)
        .await
        .unwrap();
    assert_eq!(sorted.sort, "book_name");
    assert_eq!(sorted.books[0].book_name, "100% cotton");

    let fallback = services
        .catalog
        .list_available_books(None, Some("password"), None)
        .await
        .unwrap();
    assert_eq!(fallback.sort, "id");
    assert_eq!(fallback.books.len(), 3);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn user_list_is_admin_only(pool: PgPool) {
    let services = services(&pool, Arc::new(RecordingMailer::default()));
    let token = active_reader(&services, "reader@example.com").await;

    let forbidden = services.accounts.list_users(&token).await;
    assert!(matches!(forbidden, Err(AppError::Forbidden(_))));

    let unknown = services.accounts.list_users("no-such-token").await;
    assert!(matches!(unknown, Err(AppError::Unauthenticated(_))));

    sqlx::query("UPDATE user_table SET is_admin = TRUE WHERE email = 'reader@example.com'")
        .execute(&pool)
        .await
        .unwrap();

    let users = services.accounts.list_users(&token).await.unwrap();
    assert_eq!(users.len(), 1);
    assert!(users[0].admin);
    assert!(users[0].activated);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn deleting_a_user_frees_their_books(pool: PgPool) {
    let services = services(&pool, Arc::new(RecordingMailer::default()));
    let admin = active_reader(&services, "admin@example.com").await;
    let reader = active_reader(&services, "reader@example.com").await;
    sqlx::query("UPDATE user_table SET is_admin = TRUE WHERE email = 'admin@example.com'")
        .execute(&pool)
        .await
        .unwrap();

    let book_id = insert_book(&pool, "Dune").await;
    services.catalog.borrow_book(&reader, book_id).await.unwrap();

    let reader_id: i32 = sqlx::query_scalar("SELECT id FROM user_table WHERE email = 'reader@example.com'")
        .fetch_one(&pool)
        .await
        .unwrap();

    let denied = services.accounts.delete_user(&reader, reader_id).await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));

    services.accounts.delete_user(&admin, reader_id).await.unwrap();

    let borrowed: bool = sqlx::query_scalar("SELECT borrowed FROM books WHERE id = $1")
        .bind(book_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(!borrowed);

    // already gone
    services.accounts.delete_user(&admin, reader_id).await.unwrap();
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn broadcast_reaches_every_user(pool: PgPool) {
    let mailer = Arc::new(RecordingMailer::default());
    let services = services(&pool, mailer.clone());
    let admin = active_reader(&services, "admin@example.com").await;
    active_reader(&services, "a@example.com").await;
    active_reader(&services, "b@example.com").await;
    sqlx::query("UPDATE user_table SET is_admin = TRUE WHERE email = 'admin@example.com'")
        .execute(&pool)
        .await
        .unwrap();

    let report = services.accounts.broadcast(&admin, "Library closed Monday", 2).await.unwrap();
    assert_eq!(report.sent, 3);
    assert!(report.failed.is_empty());
    assert_eq!(
        mailer.last_to("b@example.com").unwrap().text,
        "Library closed Monday"
    );
}
