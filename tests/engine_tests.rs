mod common;

use common::{TempDatabase, create_user, create_user_with_id, engine, memory_db};
use sessiongate::error::AuthError;
use sessiongate::jwt::TokenClass;
use sessiongate::settings::AuthSettings;
use std::time::Duration;

#[tokio::test]
async fn test_sign_in_rotate_destroy_scenario() {
    let db = memory_db().await;
    create_user_with_id(&db, 42).await;
    let engine = engine(db, AuthSettings::default());

    let pair = engine.sign_in(42).await.unwrap();
    let (a1, r1) = (pair.access.token, pair.refresh.token);

    let refresh = engine.authenticate_refresh(Some(&r1)).await.unwrap();
    let session_id = refresh.identity().session_id;
    let a2 = engine.rotate(&refresh).await.unwrap().token;

    assert!(matches!(
        engine.authenticate(TokenClass::Access, Some(&a1)).await,
        Err(AuthError::InvalidOrExpired)
    ));
    let identity = engine
        .authenticate(TokenClass::Access, Some(&a2))
        .await
        .unwrap();
    assert_eq!((identity.user_id, identity.session_id), (42, session_id));
    let identity = engine
        .authenticate(TokenClass::Refresh, Some(&r1))
        .await
        .unwrap();
    assert_eq!((identity.user_id, identity.session_id), (42, session_id));

    assert!(engine.logout(identity).await.unwrap());

    assert!(matches!(
        engine.authenticate(TokenClass::Access, Some(&a2)).await,
        Err(AuthError::InvalidOrExpired)
    ));
    assert!(matches!(
        engine.authenticate(TokenClass::Refresh, Some(&r1)).await,
        Err(AuthError::InvalidOrExpired)
    ));
}

#[tokio::test]
async fn test_refresh_token_survives_repeated_rotation() {
    let db = memory_db().await;
    let user_id = create_user(&db, "alice@example.com").await;
    let engine = engine(db, AuthSettings::default());

    let pair = engine.sign_in(user_id).await.unwrap();
    let mut previous = pair.access.token;

    for _ in 0..3 {
        let refresh = engine
            .authenticate_refresh(Some(&pair.refresh.token))
            .await
            .unwrap();
        let next = engine.rotate(&refresh).await.unwrap().token;

        assert!(
            engine
                .authenticate(TokenClass::Access, Some(&previous))
                .await
                .is_err()
        );
        assert!(
            engine
                .authenticate(TokenClass::Access, Some(&next))
                .await
                .is_ok()
        );
        previous = next;
    }
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let db = memory_db().await;
    let user_id = create_user(&db, "alice@example.com").await;
    let engine = engine(db, AuthSettings::default());

    let laptop = engine.sign_in(user_id).await.unwrap();
    let phone = engine.sign_in(user_id).await.unwrap();

    let identity = engine
        .authenticate(TokenClass::Access, Some(&laptop.access.token))
        .await
        .unwrap();
    engine.logout(identity).await.unwrap();

    assert!(
        engine
            .authenticate(TokenClass::Access, Some(&laptop.access.token))
            .await
            .is_err()
    );
    assert!(
        engine
            .authenticate(TokenClass::Access, Some(&phone.access.token))
            .await
            .is_ok()
    );
    assert!(
        engine
            .authenticate(TokenClass::Refresh, Some(&phone.refresh.token))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_failed_rotation_leaves_session_untouched() {
    let db = memory_db().await;
    let user_id = create_user(&db, "alice@example.com").await;
    let engine = engine(db.clone(), AuthSettings::default());
    let pair = engine.sign_in(user_id).await.unwrap();

    sqlx::query(
        "CREATE TRIGGER fail_rotation BEFORE UPDATE OF access_fingerprint ON sessions
         BEGIN SELECT RAISE(ABORT, 'rotation refused'); END",
    )
    .execute(db.pool())
    .await
    .unwrap();

    let refresh = engine
        .authenticate_refresh(Some(&pair.refresh.token))
        .await
        .unwrap();
    let result = engine.rotate(&refresh).await;
    assert!(matches!(
        result,
        Err(AuthError::TransactionFailure {
            operation: "rotate",
            ..
        })
    ));

    // The old access token was never visibly revoked.
    assert!(
        engine
            .authenticate(TokenClass::Access, Some(&pair.access.token))
            .await
            .is_ok()
    );
    let session = db
        .sessions()
        .find_by_user_and_id(user_id, refresh.identity().session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        session.token_pair(TokenClass::Access).0,
        pair.access.fingerprint.as_str()
    );
    let (blacklisted,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM blacklist")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(blacklisted, 0);
}

#[tokio::test]
async fn test_rotation_after_logout_is_rejected() {
    let db = memory_db().await;
    let user_id = create_user(&db, "alice@example.com").await;
    let engine = engine(db, AuthSettings::default());
    let pair = engine.sign_in(user_id).await.unwrap();

    // Verified before the logout, rotated after it.
    let refresh = engine
        .authenticate_refresh(Some(&pair.refresh.token))
        .await
        .unwrap();
    engine.logout(refresh.identity()).await.unwrap();

    assert!(matches!(
        engine.rotate(&refresh).await,
        Err(AuthError::InvalidOrExpired)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rotations_leave_one_current_token() {
    let temp = TempDatabase::new().await;
    let user_id = create_user(&temp.db, "alice@example.com").await;
    let engine = engine(temp.db.clone(), AuthSettings::default());
    let pair = engine.sign_in(user_id).await.unwrap();

    let refresh = engine
        .authenticate_refresh(Some(&pair.refresh.token))
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        {
            let engine = engine.clone();
            let refresh = refresh.clone();
            tokio::spawn(async move { engine.rotate(&refresh).await })
        },
        {
            let engine = engine.clone();
            let refresh = refresh.clone();
            tokio::spawn(async move { engine.rotate(&refresh).await })
        }
    );
    let first = first.unwrap().unwrap();
    let second = second.unwrap().unwrap();

    let mut valid = Vec::new();
    for token in [&first, &second] {
        if engine
            .authenticate(TokenClass::Access, Some(&token.token))
            .await
            .is_ok()
        {
            valid.push(token);
        }
    }
    assert_eq!(valid.len(), 1, "exactly one rotated token must stay valid");

    let session = temp
        .db
        .sessions()
        .find_by_user_and_id(user_id, refresh.identity().session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        session.token_pair(TokenClass::Access).0,
        valid[0].fingerprint.as_str()
    );
    assert!(
        engine
            .authenticate(TokenClass::Access, Some(&pair.access.token))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_access_token_expires() {
    let db = memory_db().await;
    let user_id = create_user(&db, "alice@example.com").await;
    let settings = AuthSettings {
        access_ttl: Duration::from_secs(1),
        ..AuthSettings::default()
    };
    let engine = engine(db, settings);

    let pair = engine.sign_in(user_id).await.unwrap();
    assert!(
        engine
            .authenticate(TokenClass::Access, Some(&pair.access.token))
            .await
            .is_ok()
    );

    tokio::time::sleep(Duration::from_millis(2100)).await;

    assert!(matches!(
        engine
            .authenticate(TokenClass::Access, Some(&pair.access.token))
            .await,
        Err(AuthError::InvalidOrExpired)
    ));
    assert!(
        engine
            .authenticate(TokenClass::Refresh, Some(&pair.refresh.token))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_missing_token() {
    let db = memory_db().await;
    let engine = engine(db, AuthSettings::default());

    assert!(matches!(
        engine.authenticate(TokenClass::Access, None).await,
        Err(AuthError::Unauthenticated)
    ));
    assert!(matches!(
        engine.authenticate_refresh(None).await,
        Err(AuthError::Unauthenticated)
    ));
}

#[tokio::test]
async fn test_logged_out_tokens_stay_rejected_until_they_expire() {
    let db = memory_db().await;
    let user_id = create_user(&db, "alice@example.com").await;
    let settings = AuthSettings {
        access_ttl: Duration::from_secs(1),
        refresh_ttl: Duration::from_secs(1),
        blacklist_ttl: Duration::from_secs(1),
        ..AuthSettings::default()
    };
    let engine = engine(db, settings);

    let pair = engine.sign_in(user_id).await.unwrap();
    let identity = engine
        .authenticate(TokenClass::Access, Some(&pair.access.token))
        .await
        .unwrap();
    engine.logout(identity).await.unwrap();

    // Covers the second in which both the tokens and their entries expire.
    let deadline = tokio::time::Instant::now() + Duration::from_millis(2500);
    while tokio::time::Instant::now() < deadline {
        assert!(matches!(
            engine
                .authenticate(TokenClass::Access, Some(&pair.access.token))
                .await,
            Err(AuthError::InvalidOrExpired)
        ));
        assert!(matches!(
            engine
                .authenticate(TokenClass::Refresh, Some(&pair.refresh.token))
                .await,
            Err(AuthError::InvalidOrExpired)
        ));
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
