use anyhow::Result;
use chrono::{TimeZone, Utc};
use rstest::*;

use crate::db::{memory_pool, Repository};
use crate::model::{
    ban::Ban, blacklist::BlacklistEntry, complaint::Complaint, deregistration::Deregistration,
    user::User,
};

const MEMBER: u64 = 948517362313863198;

#[rstest]
#[tokio::test]
async fn user_roundtrip() -> Result<()> {
    // Arrange
    let pool = memory_pool().await;
    let repo = User::repository(&pool);

    // Act
    let id = repo.insert(&User::new(MEMBER, "1234")).await?;
    let found = repo.get(MEMBER).await?;

    // Assert
    let expected = User { id, discord_id: MEMBER, discriminator: "1234".into() };
    assert_eq!(Some(expected), found);
    assert!(repo.exists(MEMBER).await?);

    Ok(())
}

#[rstest]
#[tokio::test]
async fn unknown_user_is_none() -> Result<()> {
    let pool = memory_pool().await;
    let repo = User::repository(&pool);

    assert_eq!(None, repo.get(1).await?);
    assert!(!repo.exists(1).await?);

    Ok(())
}

#[rstest]
#[tokio::test]
async fn duplicate_user_is_rejected() -> Result<()> {
    let pool = memory_pool().await;
    let repo = User::repository(&pool);

    repo.insert(&User::new(MEMBER, "0")).await?;
    let second = repo.insert(&User::new(MEMBER, "0")).await;

    assert!(second.is_err(), "discord_id is unique");
    Ok(())
}

#[rstest]
#[tokio::test]
async fn delete_user_reports_rows() -> Result<()> {
    let pool = memory_pool().await;
    let repo = User::repository(&pool);
    repo.insert(&User::new(MEMBER, "0")).await?;

    assert_eq!(1, repo.delete(MEMBER).await?);
    assert_eq!(0, repo.delete(MEMBER).await?);
    assert!(!repo.exists(MEMBER).await?);

    Ok(())
}

#[rstest]
#[tokio::test]
async fn ban_for_unknown_user_is_stored() -> Result<()> {
    let pool = memory_pool().await;
    let repo = Ban::repository(&pool);

    let id = repo.insert(&Ban::new(MEMBER, "spam")).await?;

    assert_eq!(Some(Ban { id, discord_id: MEMBER, reason: "spam".into() }), repo.get(MEMBER).await?);
    assert!(!User::repository(&pool).exists(MEMBER).await?);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn deleting_user_keeps_dependent_rows() -> Result<()> {
    // Arrange
    let pool = memory_pool().await;
    let users = User::repository(&pool);
    users.insert(&User::new(MEMBER, "0")).await?;
    Ban::repository(&pool).insert(&Ban::new(MEMBER, "spam")).await?;
    BlacklistEntry::repository(&pool).insert(&BlacklistEntry::new(MEMBER, "cheating")).await?;
    Complaint::repository(&pool).insert(&Complaint {
        id: 0,
        discord_id: MEMBER,
        message: "Officer was rude".into(),
        category: "lspd".into(),
        complaint: None,
    }).await?;

    // Act
    let removed = users.delete(MEMBER).await?;

    // Assert
    assert_eq!(1, removed);
    assert!(!users.exists(MEMBER).await?);
    assert!(Ban::repository(&pool).get(MEMBER).await?.is_some());
    assert!(BlacklistEntry::repository(&pool).get(MEMBER).await?.is_some());
    assert!(Complaint::repository(&pool).get(MEMBER).await?.is_some());
    Ok(())
}

#[rstest]
#[tokio::test]
async fn ban_get_returns_first_and_delete_removes_all() -> Result<()> {
    let pool = memory_pool().await;
    User::repository(&pool).insert(&User::new(MEMBER, "0")).await?;
    let repo = Ban::repository(&pool);

    let first = repo.insert(&Ban::new(MEMBER, "spam")).await?;
    repo.insert(&Ban::new(MEMBER, "again")).await?;

    let found = repo.get(MEMBER).await?.expect("a ban was inserted");
    assert_eq!(first, found.id);
    assert_eq!("spam", found.reason);

    assert_eq!(2, repo.delete(MEMBER).await?);
    assert_eq!(None, repo.get(MEMBER).await?);

    Ok(())
}

#[rstest]
#[tokio::test]
async fn blacklist_roundtrip() -> Result<()> {
    let pool = memory_pool().await;
    User::repository(&pool).insert(&User::new(MEMBER, "0")).await?;
    let repo = BlacklistEntry::repository(&pool);

    let id = repo.insert(&BlacklistEntry::new(MEMBER, "fraud")).await?;

    assert_eq!(Some(BlacklistEntry { id, discord_id: MEMBER, reason: "fraud".into() }), repo.get(MEMBER).await?);
    assert_eq!(1, repo.delete(MEMBER).await?);

    Ok(())
}

#[rstest]
#[tokio::test]
async fn deregistration_roundtrip() -> Result<()> {
    let pool = memory_pool().await;
    User::repository(&pool).insert(&User::new(MEMBER, "0")).await?;
    let repo = Deregistration::repository(&pool);

    let mut deregistration = Deregistration {
        id: 0,
        discord_id: MEMBER,
        time_stamp: Utc.with_ymd_and_hms(2024, 10, 19, 18, 30, 0).unwrap(),
        deregistration_count: 3,
        reason: "holiday".into(),
        message: "back in two weeks".into(),
    };

    deregistration.id = repo.insert(&deregistration).await?;

    assert_eq!(Some(deregistration), repo.get(MEMBER).await?);
    Ok(())
}

#[rstest]
#[case(Some("the offending message".to_string()))]
#[case(None)]
#[tokio::test]
async fn complaint_roundtrip(#[case] content: Option<String>) -> Result<()> {
    let pool = memory_pool().await;
    User::repository(&pool).insert(&User::new(MEMBER, "0")).await?;
    let repo = Complaint::repository(&pool);

    let mut complaint = Complaint {
        id: 0,
        discord_id: MEMBER,
        message: "Officer was rude".into(),
        category: "lspd".into(),
        complaint: content,
    };

    complaint.id = repo.insert(&complaint).await?;

    assert_eq!(Some(complaint), repo.get(MEMBER).await?);
    assert_eq!(1, repo.delete(MEMBER).await?);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn oversized_snowflake_is_an_error() -> Result<()> {
    let pool = memory_pool().await;

    let result = User::repository(&pool).insert(&User::new(u64::MAX, "0")).await;

    assert!(result.is_err());
    Ok(())
}
