//! Behavior that needs a live PostgreSQL.
//!
//! Run with `DATABASE_URL` pointing at a scratch database and `--ignored`.

use diesel::Connection;
use uuid::Uuid;

use helpdesk::core::config::AppConfig;
use helpdesk::core::directory::provisioning::create_user;
use helpdesk::core::directory::UserAccount;
use helpdesk::core::shared::enums::{NotificationKind, UserRole};
use helpdesk::core::shared::error::DeskError;
use helpdesk::core::shared::utils::{create_conn, run_migrations, DbPool};
use helpdesk::notifications::{count_unread, notify};

fn pool() -> DbPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL not set");
    let config = AppConfig::from_toml_str(&format!(
        "[database]\nurl = \"{url}\"\nmax_connections = 2\n\n[auth]\njwt_secret = \"db-test-secret-with-more-than-32-characters\"\n"
    ))
    .expect("test config");
    let pool = create_conn(&config.database).expect("pool");
    run_migrations(&pool).expect("migrations");
    pool
}

fn account() -> UserAccount {
    UserAccount {
        email: format!("notify-{}@campus.ac.id", Uuid::new_v4().simple()),
        password: "password123".to_string(),
        full_name: "Notified Staff".to_string(),
        role: Some(UserRole::Staff),
        identity_number: None,
        department: None,
        phone: None,
    }
}

#[test]
#[ignore] // Requires PostgreSQL
fn notifications_roll_back_with_the_mutation() {
    let pool = pool();
    let mut conn = pool.get().expect("connection");
    let user = create_user(&mut conn, account()).expect("user");

    let rolled_back = conn.transaction::<(), DeskError, _>(|conn| {
        let written = notify(
            conn,
            &[user.id],
            NotificationKind::StatusChanged,
            None,
            "Status changed",
            "Now in progress",
        );
        assert_eq!(written, 1);
        Err(DeskError::conflict("abort"))
    });
    assert!(rolled_back.is_err());
    assert_eq!(count_unread(&mut conn, user.id).expect("count"), 0);

    conn.transaction::<(), DeskError, _>(|conn| {
        notify(
            conn,
            &[user.id],
            NotificationKind::StatusChanged,
            None,
            "Status changed",
            "Now in progress",
        );
        Ok(())
    })
    .expect("commit");
    assert_eq!(count_unread(&mut conn, user.id).expect("count"), 1);
}

#[test]
#[ignore] // Requires PostgreSQL
fn failed_notification_keeps_the_mutation() {
    let pool = pool();
    let mut conn = pool.get().expect("connection");

    let user = conn
        .transaction::<_, DeskError, _>(|conn| {
            let user = create_user(conn, account())?;
            // Unknown recipient violates the foreign key inside the savepoint only.
            let written = notify(
                conn,
                &[Uuid::new_v4()],
                NotificationKind::TicketAssigned,
                None,
                "Assigned",
                "A ticket was assigned to you",
            );
            assert_eq!(written, 0);
            Ok(user)
        })
        .expect("mutation commits");

    let found: i64 = {
        use diesel::prelude::*;
        use helpdesk::core::shared::schema::users;
        users::table
            .filter(users::id.eq(user.id))
            .count()
            .get_result(&mut conn)
            .expect("count")
    };
    assert_eq!(found, 1);
}
