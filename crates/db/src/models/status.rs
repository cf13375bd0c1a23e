//! Status helper enums mapping to SMALLINT state columns.
//!
//! Each enum variant's discriminant is the value stored in the database.

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Map a database status ID back to a variant.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Queue-side state of a job row.
    JobState {
        /// Waiting for its first delivery.
        Queued = 1,
        /// Claimed by an executor.
        Running = 2,
        /// Failed an attempt and waits for `run_at` before redelivery.
        RetryScheduled = 3,
        Completed = 4,
        /// Attempts exhausted or a permanent error was reported.
        Failed = 5,
    }
}

/// States that count towards a user's live job total.
pub const LIVE_JOB_STATES: [StatusId; 3] = [
    JobState::Queued as StatusId,
    JobState::Running as StatusId,
    JobState::RetryScheduled as StatusId,
];

impl JobState {
    /// Whether the job still occupies a slot in the pending-job cap.
    pub fn is_live(self) -> bool {
        LIVE_JOB_STATES.contains(&self.id())
    }

    /// Whether an executor may claim a job in this state.
    pub fn is_claimable(self) -> bool {
        matches!(self, JobState::Queued | JobState::RetryScheduled)
    }
}
