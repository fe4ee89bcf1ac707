/// Lifetime review statistics and achievements
///
/// These counters accumulate across every completed scope.
/// They are serialized to JSON and stored in the database.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::data::ScopeSummary;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Totals across every completed review session
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct LifetimeStats {
    pub total_reviewed: u64,
    pub total_deleted: u64,
    /// Includes favourites
    pub total_kept: u64,
    pub total_favourited: u64,
    pub months_completed: u64,
    pub storage_freed_bytes: u64,

    /// Consecutive days with at least one completed session
    pub current_streak: u32,
    pub best_streak: u32,
    pub sessions_completed: u64,
    pub last_session_day: Option<NaiveDate>,
}

impl LifetimeStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert to JSON string for database storage
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from JSON string (from database)
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Fold one finished scope into the totals
    pub fn record_session(&mut self, summary: &ScopeSummary, freed_bytes: u64, today: NaiveDate) {
        self.total_reviewed += summary.reviewed as u64;
        self.total_deleted += summary.deleted as u64;
        self.total_kept += summary.kept as u64;
        self.total_favourited += summary.favourited as u64;
        self.storage_freed_bytes += freed_bytes;

        self.update_streak(today);
        self.sessions_completed += 1;
    }

    pub fn record_month_completed(&mut self) {
        self.months_completed += 1;
    }

    /// Percentage of reviewed items that were deleted
    pub fn delete_ratio(&self) -> f64 {
        if self.total_reviewed == 0 {
            return 0.0;
        }
        self.total_deleted as f64 / self.total_reviewed as f64 * 100.0
    }

    pub fn storage_freed_mb(&self) -> f64 {
        self.storage_freed_bytes as f64 / BYTES_PER_MB
    }

    pub fn storage_freed_formatted(&self) -> String {
        let mb = self.storage_freed_mb();
        if mb >= 1024.0 {
            format!("{:.1} GB", mb / 1024.0)
        } else {
            format!("{:.0} MB", mb)
        }
    }

    fn update_streak(&mut self, today: NaiveDate) {
        match self.last_session_day {
            Some(last) => {
                let days = (today - last).num_days();
                if days == 1 {
                    self.current_streak += 1;
                } else if days > 1 {
                    self.current_streak = 1;
                }
                // same day (or clock moved back): unchanged
            }
            None => self.current_streak = 1,
        }

        self.best_streak = self.best_streak.max(self.current_streak);
        self.last_session_day = Some(today);
    }

    /// Every achievement whose requirement is currently met
    pub fn unlocked_achievements(&self) -> Vec<Achievement> {
        Achievement::ALL
            .iter()
            .copied()
            .filter(|achievement| achievement.is_unlocked(self))
            .collect()
    }
}

/// Fixed achievement table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Achievement {
    FirstTen,
    Centurion,
    HalfK,
    ThousandClub,
    CleanupCrew,
    StorageHero,
    DeleteMaster,
    SpaceSaver,
    GigabyteFreedom,
    OnFire,
    WeekWarrior,
    FavouriteFinder,
    MonthOne,
    MonthSix,
    MonthTwelve,
}

impl Achievement {
    pub const ALL: [Achievement; 15] = [
        Achievement::FirstTen,
        Achievement::Centurion,
        Achievement::HalfK,
        Achievement::ThousandClub,
        Achievement::CleanupCrew,
        Achievement::StorageHero,
        Achievement::DeleteMaster,
        Achievement::SpaceSaver,
        Achievement::GigabyteFreedom,
        Achievement::OnFire,
        Achievement::WeekWarrior,
        Achievement::FavouriteFinder,
        Achievement::MonthOne,
        Achievement::MonthSix,
        Achievement::MonthTwelve,
    ];

    pub fn is_unlocked(self, stats: &LifetimeStats) -> bool {
        let mb = stats.storage_freed_mb();
        match self {
            Achievement::FirstTen => stats.total_reviewed >= 10,
            Achievement::Centurion => stats.total_reviewed >= 100,
            Achievement::HalfK => stats.total_reviewed >= 500,
            Achievement::ThousandClub => stats.total_reviewed >= 1000,
            Achievement::CleanupCrew => stats.total_deleted >= 50,
            Achievement::StorageHero => stats.total_deleted >= 200,
            Achievement::DeleteMaster => stats.total_deleted >= 500,
            Achievement::SpaceSaver => mb >= 100.0,
            Achievement::GigabyteFreedom => mb >= 1024.0,
            Achievement::OnFire => stats.best_streak >= 3,
            Achievement::WeekWarrior => stats.best_streak >= 7,
            Achievement::FavouriteFinder => stats.total_favourited >= 25,
            Achievement::MonthOne => stats.months_completed >= 1,
            Achievement::MonthSix => stats.months_completed >= 6,
            Achievement::MonthTwelve => stats.months_completed >= 12,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Achievement::FirstTen => "First Ten",
            Achievement::Centurion => "Centurion",
            Achievement::HalfK => "500 Club",
            Achievement::ThousandClub => "1K Club",
            Achievement::CleanupCrew => "Cleanup Crew",
            Achievement::StorageHero => "Storage Hero",
            Achievement::DeleteMaster => "Delete Master",
            Achievement::SpaceSaver => "Space Saver",
            Achievement::GigabyteFreedom => "GB Freedom",
            Achievement::OnFire => "On Fire",
            Achievement::WeekWarrior => "Week Warrior",
            Achievement::FavouriteFinder => "Favourite Finder",
            Achievement::MonthOne => "First Month",
            Achievement::MonthSix => "Half Year",
            Achievement::MonthTwelve => "Year Clean",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Achievement::FirstTen => "Review 10 photos",
            Achievement::Centurion => "Review 100 photos",
            Achievement::HalfK => "Review 500 photos",
            Achievement::ThousandClub => "Review 1,000 photos",
            Achievement::CleanupCrew => "Delete 50 photos",
            Achievement::StorageHero => "Delete 200 photos",
            Achievement::DeleteMaster => "Delete 500 photos",
            Achievement::SpaceSaver => "Free 100 MB",
            Achievement::GigabyteFreedom => "Free 1 GB",
            Achievement::OnFire => "3 day streak",
            Achievement::WeekWarrior => "7 day streak",
            Achievement::FavouriteFinder => "Favourite 25 photos",
            Achievement::MonthOne => "Complete 1 month",
            Achievement::MonthSix => "Complete 6 months",
            Achievement::MonthTwelve => "Complete 12 months",
        }
    }
}
