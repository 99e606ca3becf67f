//! Discussion lifecycle state machine.
//!
//! This module provides a pure, side-effect-free state machine for the comment
//! thread of the open discussion. The state machine takes events as input and
//! produces a new state plus a list of actions to execute.
//!
//! ```text
//! Closed ──open──▶ Loading ──fetch resolved──▶ Live ──close──▶ Closed
//!                     ▲                          │
//!                     └────── open other ────────┘
//! ```
//!
//! Every open carries a generation number chosen by the caller. Fetch and
//! subscribe results tagged with an older generation describe a discussion
//! that is no longer open and are ignored, so a slow response can never
//! mutate a detached list.
//!
//! The actual I/O (fetching, subscribing, timers) is performed by feed-client,
//! not by this module.

use feed_types::PostId;

/// Lifecycle of the open discussion's comment thread - NO I/O, just transitions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ThreadState {
    /// No discussion open.
    #[default]
    Closed,
    /// Initial comment fetch in progress.
    Loading {
        /// The discussion being opened.
        discussion: PostId,
        /// Generation of this open.
        generation: u64,
    },
    /// Fetch resolved; push events are applied.
    Live {
        /// The open discussion.
        discussion: PostId,
        /// Generation of this open.
        generation: u64,
        /// Whether the push subscription is established. `false` means the
        /// thread is degraded to the fallback re-fetch only.
        subscribed: bool,
    },
}

impl ThreadState {
    /// Create a new state machine in the Closed state.
    pub fn new() -> Self {
        Self::Closed
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (feed-client)
    /// is responsible for executing the returned actions in order.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // Opening
            (Self::Closed, Event::OpenRequested { discussion, generation }) => (
                Self::Loading {
                    discussion: discussion.clone(),
                    generation,
                },
                open_actions(discussion, generation),
            ),
            (
                Self::Loading {
                    discussion: current,
                    generation: current_gen,
                },
                Event::OpenRequested { discussion, generation },
            ) => {
                if current == discussion {
                    return (
                        Self::Loading {
                            discussion: current,
                            generation: current_gen,
                        },
                        vec![],
                    );
                }
                let mut actions = vec![
                    Action::CancelRefetch,
                    Action::EmitEvent(ThreadEvent::Closed {
                        discussion: current,
                    }),
                ];
                actions.extend(open_actions(discussion.clone(), generation));
                (
                    Self::Loading {
                        discussion,
                        generation,
                    },
                    actions,
                )
            }
            (
                Self::Live {
                    discussion: current,
                    generation: current_gen,
                    subscribed,
                },
                Event::OpenRequested { discussion, generation },
            ) => {
                if current == discussion {
                    return (
                        Self::Live {
                            discussion: current,
                            generation: current_gen,
                            subscribed,
                        },
                        vec![],
                    );
                }
                let mut actions = close_actions(current);
                actions.extend(open_actions(discussion.clone(), generation));
                (
                    Self::Loading {
                        discussion,
                        generation,
                    },
                    actions,
                )
            }

            // From Loading
            (
                Self::Loading {
                    discussion,
                    generation,
                },
                Event::FetchSucceeded { generation: g },
            ) if g == generation => (
                Self::Live {
                    discussion: discussion.clone(),
                    generation,
                    subscribed: false,
                },
                vec![
                    Action::Subscribe {
                        discussion: discussion.clone(),
                        generation,
                    },
                    Action::EmitEvent(ThreadEvent::Live { discussion }),
                ],
            ),
            (
                Self::Loading {
                    discussion,
                    generation,
                },
                Event::FetchFailed {
                    generation: g,
                    error,
                },
            ) if g == generation => (
                Self::Live {
                    discussion: discussion.clone(),
                    generation,
                    subscribed: false,
                },
                vec![
                    Action::Subscribe {
                        discussion: discussion.clone(),
                        generation,
                    },
                    Action::EmitEvent(ThreadEvent::FetchFailed {
                        discussion: discussion.clone(),
                        error,
                    }),
                    Action::EmitEvent(ThreadEvent::Live { discussion }),
                ],
            ),

            // From Live
            (
                Self::Live {
                    discussion,
                    generation,
                    ..
                },
                Event::SubscribeSucceeded { generation: g },
            ) if g == generation => (
                Self::Live {
                    discussion,
                    generation,
                    subscribed: true,
                },
                vec![],
            ),
            (
                Self::Live {
                    discussion,
                    generation,
                    ..
                },
                Event::SubscribeFailed {
                    generation: g,
                    error,
                },
            ) if g == generation => (
                Self::Live {
                    discussion: discussion.clone(),
                    generation,
                    subscribed: false,
                },
                vec![Action::EmitEvent(ThreadEvent::Degraded { discussion, error })],
            ),
            (
                Self::Live {
                    discussion,
                    generation,
                    subscribed,
                },
                Event::RefetchRequested { generation: g },
            ) if g == generation => (
                Self::Live {
                    discussion: discussion.clone(),
                    generation,
                    subscribed,
                },
                vec![Action::Fetch {
                    discussion,
                    generation,
                }],
            ),
            (
                Self::Live {
                    discussion,
                    generation,
                    subscribed,
                },
                Event::FetchFailed {
                    generation: g,
                    error,
                },
            ) if g == generation => (
                Self::Live {
                    discussion: discussion.clone(),
                    generation,
                    subscribed,
                },
                vec![Action::EmitEvent(ThreadEvent::FetchFailed { discussion, error })],
            ),

            // Closing
            (Self::Loading { discussion, .. }, Event::CloseRequested) => (
                Self::Closed,
                vec![
                    Action::CancelRefetch,
                    Action::EmitEvent(ThreadEvent::Closed { discussion }),
                ],
            ),
            (Self::Live { discussion, .. }, Event::CloseRequested) => {
                (Self::Closed, close_actions(discussion))
            }

            // Stale generations and invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// The open (or opening) discussion.
    pub fn discussion(&self) -> Option<&PostId> {
        match self {
            Self::Closed => None,
            Self::Loading { discussion, .. } | Self::Live { discussion, .. } => Some(discussion),
        }
    }

    /// Generation of the current open, if any.
    pub fn generation(&self) -> Option<u64> {
        match self {
            Self::Closed => None,
            Self::Loading { generation, .. } | Self::Live { generation, .. } => Some(*generation),
        }
    }

    /// Check whether `generation` is the current open.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation() == Some(generation)
    }

    /// Check if the thread is live.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live { .. })
    }

    /// Check if the initial fetch is in progress.
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    /// Check if live but without a push subscription.
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            Self::Live {
                subscribed: false,
                ..
            }
        )
    }
}

fn open_actions(discussion: PostId, generation: u64) -> Vec<Action> {
    vec![
        Action::ShowCached {
            discussion: discussion.clone(),
        },
        Action::EmitEvent(ThreadEvent::Opened {
            discussion: discussion.clone(),
        }),
        Action::Fetch {
            discussion,
            generation,
        },
    ]
}

fn close_actions(discussion: PostId) -> Vec<Action> {
    vec![
        Action::Unsubscribe {
            discussion: discussion.clone(),
        },
        Action::CancelRefetch,
        Action::RetainCache {
            discussion: discussion.clone(),
        },
        Action::EmitEvent(ThreadEvent::Closed { discussion }),
    ]
}

/// Events that can occur in a discussion's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Viewer opened a discussion.
    OpenRequested {
        /// Discussion to open.
        discussion: PostId,
        /// Fresh generation number for this open.
        generation: u64,
    },
    /// Comment fetch resolved.
    FetchSucceeded {
        /// Generation the fetch was issued for.
        generation: u64,
    },
    /// Comment fetch failed.
    FetchFailed {
        /// Generation the fetch was issued for.
        generation: u64,
        /// Error message describing the failure.
        error: String,
    },
    /// Push subscription established.
    SubscribeSucceeded {
        /// Generation the subscription was made for.
        generation: u64,
    },
    /// Push subscription failed.
    SubscribeFailed {
        /// Generation the subscription was made for.
        generation: u64,
        /// Error message describing the failure.
        error: String,
    },
    /// Fallback re-fetch timer fired.
    RefetchRequested {
        /// Generation the timer was armed for.
        generation: u64,
    },
    /// Viewer closed the discussion.
    CloseRequested,
}

/// Actions to be executed by feed-client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Display retained comments for the discussion, if any.
    ShowCached {
        /// Discussion whose cache to show.
        discussion: PostId,
    },
    /// Fetch the full comment list and replace the held one.
    Fetch {
        /// Discussion to fetch.
        discussion: PostId,
        /// Generation to tag the result with.
        generation: u64,
    },
    /// Subscribe to the discussion's push topic.
    Subscribe {
        /// Topic.
        discussion: PostId,
        /// Generation to tag the result with.
        generation: u64,
    },
    /// Unsubscribe from the discussion's push topic.
    Unsubscribe {
        /// Topic.
        discussion: PostId,
    },
    /// Keep the current comments for instant redisplay.
    RetainCache {
        /// Discussion being closed.
        discussion: PostId,
    },
    /// Cancel a pending fallback re-fetch.
    CancelRefetch,
    /// Emit an event to the application.
    EmitEvent(ThreadEvent),
}

/// Events emitted to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadEvent {
    /// A discussion started opening.
    Opened {
        /// The discussion.
        discussion: PostId,
    },
    /// The thread is live.
    Live {
        /// The discussion.
        discussion: PostId,
    },
    /// A comment fetch failed; the panel keeps what it showed.
    FetchFailed {
        /// The discussion.
        discussion: PostId,
        /// Error message describing the failure.
        error: String,
    },
    /// Push subscription failed; only the fallback re-fetch keeps the thread fresh.
    Degraded {
        /// The discussion.
        discussion: PostId,
        /// Error message describing the failure.
        error: String,
    },
    /// The discussion was closed.
    Closed {
        /// The discussion.
        discussion: PostId,
    },
}
