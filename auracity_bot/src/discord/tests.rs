use std::num::NonZeroU16;
use std::time::Duration;

use poise::serenity_prelude::{GuildId, Message, Timestamp, UserId};
use rstest::*;

use auracity_common::prelude::*;
use auracity_storage::prelude::*;

use crate::discord::commands::usage_hint;
use crate::discord::events::*;
use crate::discord::jobs::{all, status_change_notice};
use crate::job::Schedule;
use crate::spam::SpamTracker;
use crate::test_support::memory_pool;

const MEMBER: UserId = UserId::new(948517362313863198);

#[fixture]
fn test_config() -> BotConfig {
    crate::test_support::test_config()
}

#[rstest]
fn every_job_is_scheduled(test_config: BotConfig) {
    // Act
    let jobs = all(&test_config);

    // Assert
    let schedules: Vec<(&str, Schedule, bool)> = jobs.iter()
        .map(|job| (job.name(), job.schedule(), job.run_at_startup()))
        .collect();

    assert_eq!(vec![
        ("database_backup", Schedule::Daily, true),
        ("log_archive", Schedule::Daily, false),
        ("presence", Schedule::Every(Duration::from_secs(120)), false),
        ("server_poll", Schedule::Every(Duration::from_secs(300)), false),
    ], schedules);
}

#[rstest]
fn job_intervals_follow_the_config(mut test_config: BotConfig) {
    test_config.presence_interval_secs = 30;
    test_config.fivem.poll_interval_secs = 60;

    let schedules: Vec<Schedule> = all(&test_config).iter().map(|job| job.schedule()).collect();

    assert!(schedules.contains(&Schedule::Every(Duration::from_secs(30))));
    assert!(schedules.contains(&Schedule::Every(Duration::from_secs(60))));
}

#[rstest]
fn first_time_greeting() {
    let greeting = greeting(MEMBER, false);

    assert_eq!(Greeting {
        welcome: "Welcome to the server, <@948517362313863198>!".into(),
        join_log: "<@948517362313863198> joined the server (first time).".into(),
    }, greeting);
}

#[rstest]
fn returning_greeting() {
    let greeting = greeting(MEMBER, true);

    assert_eq!("Welcome back, <@948517362313863198>!", greeting.welcome);
    assert_eq!("<@948517362313863198> joined the server (returning).", greeting.join_log);
}

#[rstest]
fn leave_notice_names_the_member() {
    assert_eq!("<@948517362313863198> (aura) has left the server.", leave_notice(MEMBER, "aura"));
}

#[rstest]
#[case(5, "Spam detected: more than 5 messages in a short time.")]
#[case(10, "Spam detected: more than 10 messages in a short time.")]
fn spam_reason_mentions_the_limit(#[case] limit: usize, #[case] expected: &str) {
    assert_eq!(expected, spam_reason(limit));
}

#[rstest]
#[case("clear", "Please provide the amount of messages you would like to clear (1 to 100).")]
#[case("status", "Invalid arguments for /status.")]
fn usage_hints(#[case] command: &str, #[case] expected: &str) {
    assert_eq!(expected, usage_hint(command));
}

#[rstest]
#[case(true, "The server is back online.")]
#[case(false, "The server went offline.")]
fn status_change_notices(#[case] online: bool, #[case] expected: &str) {
    assert_eq!(expected, status_change_notice(online));
}

const OTHER_GUILD: GuildId = GuildId::new(2);

#[rstest]
#[case(GuildId::new(1), false, JoinAction::Welcome)]
#[case(GuildId::new(1), true, JoinAction::BanBot)]
#[case(OTHER_GUILD, false, JoinAction::Ignore)]
#[case(OTHER_GUILD, true, JoinAction::Ignore)]
fn join_actions(test_config: BotConfig, #[case] guild: GuildId, #[case] is_bot: bool, #[case] expected: JoinAction) {
    assert_eq!(expected, join_action(&test_config, guild, is_bot));
}

#[rstest]
fn leaves_from_other_guilds_are_ignored(test_config: BotConfig) {
    assert!(is_community_guild(&test_config, GuildId::new(1)));
    assert!(!is_community_guild(&test_config, OTHER_GUILD));
}

#[rstest]
#[tokio::test]
async fn unknown_member_is_stored_and_greeted() -> anyhow::Result<()> {
    // Arrange
    let pool = memory_pool().await;

    // Act
    let greeting = register_member(&pool, MEMBER, None).await?;

    // Assert
    assert_eq!("Welcome to the server, <@948517362313863198>!", greeting.welcome);
    let stored = User::repository(&pool).get(MEMBER.get()).await?.expect("member was stored");
    assert_eq!("0", stored.discriminator);

    Ok(())
}

#[rstest]
#[tokio::test]
async fn known_member_gets_the_returning_greeting() -> anyhow::Result<()> {
    // Arrange
    let pool = memory_pool().await;
    register_member(&pool, MEMBER, NonZeroU16::new(1234)).await?;

    // Act
    let greeting = register_member(&pool, MEMBER, NonZeroU16::new(1234)).await?;

    // Assert
    assert_eq!("Welcome back, <@948517362313863198>!", greeting.welcome);
    let stored = User::repository(&pool).get(MEMBER.get()).await?.expect("member was stored");
    assert_eq!("1234", stored.discriminator);

    Ok(())
}

fn message_at(author: UserId, guild: Option<GuildId>, sent_at: i64) -> Message {
    let mut message = Message::default();
    message.author.id = author;
    message.guild_id = guild;
    message.timestamp = Timestamp::from_unix_timestamp(sent_at).unwrap();
    message
}

#[rstest]
fn spam_window_uses_the_send_time() {
    let mut tracker = SpamTracker::new(Duration::from_secs(60), 5);
    let start = 1_729_360_800;

    // six messages two minutes apart, all handled at once
    let flagged: Vec<Option<usize>> = (0..6)
        .map(|i| check_spam(&mut tracker, &message_at(MEMBER, Some(GuildId::new(1)), start + i * 120)))
        .collect();

    assert!(flagged.iter().all(Option::is_none));

    // a burst delivered late still counts as a burst
    let burst: Vec<Option<usize>> = (0..6)
        .map(|i| check_spam(&mut tracker, &message_at(MEMBER, Some(GuildId::new(1)), start + 3600 + i)))
        .collect();

    assert_eq!(Some(5), burst[5]);
}

#[rstest]
fn direct_messages_and_bots_are_not_counted() {
    let mut tracker = SpamTracker::new(Duration::from_secs(60), 0);
    let mut from_bot = message_at(MEMBER, Some(GuildId::new(1)), 0);
    from_bot.author.bot = true;

    assert_eq!(None, check_spam(&mut tracker, &message_at(MEMBER, None, 0)));
    assert_eq!(None, check_spam(&mut tracker, &from_bot));
    assert_eq!(Some(0), check_spam(&mut tracker, &message_at(MEMBER, Some(GuildId::new(1)), 0)));
}

#[rstest]
fn owner_is_spared_but_history_is_cleared() {
    let owner = MEMBER;
    let mut tracker = SpamTracker::new(Duration::from_secs(60), 5);

    let limit = (0..6)
        .filter_map(|i| check_spam(&mut tracker, &message_at(owner, Some(GuildId::new(1)), i)))
        .last()
        .expect("the sixth message goes over the limit");

    assert_eq!(SpamAction::Spare, spam_action(owner, owner, limit));
    assert_eq!(None, check_spam(&mut tracker, &message_at(owner, Some(GuildId::new(1)), 7)));
}

#[rstest]
fn other_spammers_are_kicked() {
    assert_eq!(
        SpamAction::Kick { reason: "Spam detected: more than 5 messages in a short time.".into() },
        spam_action(MEMBER, UserId::new(1), 5)
    );
}
