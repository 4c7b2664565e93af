//! SQL schema definitions.

/// Complete schema for the v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Wallets & journal
-- ============================================================

CREATE TABLE IF NOT EXISTS wallets (
    user_id TEXT NOT NULL,
    community_id TEXT NOT NULL,
    balance INTEGER NOT NULL DEFAULT 0 CHECK (balance >= 0),
    currency_label TEXT NOT NULL DEFAULT 'merits',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (user_id, community_id)
);

CREATE TABLE IF NOT EXISTS ledger_transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    reference_id TEXT NOT NULL,
    externally_funded INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

-- account_kind: wallet | score | pool | quota | emission | burn
CREATE TABLE IF NOT EXISTS ledger_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    transaction_id INTEGER NOT NULL REFERENCES ledger_transactions(id),
    account_kind TEXT NOT NULL,
    account_id TEXT NOT NULL,
    community_id TEXT NOT NULL,
    delta INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_ledger_entries_account
    ON ledger_entries(account_kind, account_id, community_id);

-- ============================================================
-- Daily quota usage (append-only)
-- ============================================================

CREATE TABLE IF NOT EXISTS quota_usage (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    community_id TEXT NOT NULL,
    amount INTEGER NOT NULL CHECK (amount > 0),
    usage_type TEXT NOT NULL,
    reference_id TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_quota_usage_user
    ON quota_usage(user_id, community_id, created_at);

-- ============================================================
-- Publications, investments, votes
-- ============================================================

CREATE TABLE IF NOT EXISTS publications (
    id TEXT PRIMARY KEY,
    community_id TEXT NOT NULL,
    author_id TEXT NOT NULL,
    beneficiary_id TEXT,
    categories TEXT NOT NULL DEFAULT '[]',
    score INTEGER NOT NULL DEFAULT 0 CHECK (score >= 0),
    investing_enabled INTEGER NOT NULL DEFAULT 0,
    investment_pool INTEGER NOT NULL DEFAULT 0 CHECK (investment_pool >= 0),
    investment_pool_total INTEGER NOT NULL DEFAULT 0 CHECK (investment_pool_total >= 0),
    investor_share_percent INTEGER NOT NULL DEFAULT 0
        CHECK (investor_share_percent BETWEEN 0 AND 100),
    created_at INTEGER NOT NULL,
    deleted_at INTEGER,
    CHECK (investment_pool <= investment_pool_total)
);

CREATE INDEX IF NOT EXISTS idx_publications_community
    ON publications(community_id, deleted_at);

CREATE TABLE IF NOT EXISTS investments (
    publication_id TEXT NOT NULL REFERENCES publications(id),
    investor_id TEXT NOT NULL,
    amount INTEGER NOT NULL CHECK (amount > 0),
    share_percent REAL NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (publication_id, investor_id)
);

CREATE TABLE IF NOT EXISTS votes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    publication_id TEXT NOT NULL REFERENCES publications(id),
    voter_id TEXT NOT NULL,
    community_id TEXT NOT NULL,
    quota_amount INTEGER NOT NULL DEFAULT 0,
    wallet_amount INTEGER NOT NULL DEFAULT 0,
    wallet_community_id TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_votes_publication ON votes(publication_id);

-- ============================================================
-- Tappalka
-- ============================================================

CREATE TABLE IF NOT EXISTS tappalka_progress (
    user_id TEXT NOT NULL,
    community_id TEXT NOT NULL,
    comparison_count INTEGER NOT NULL DEFAULT 0,
    total_comparisons INTEGER NOT NULL DEFAULT 0,
    total_rewards_earned INTEGER NOT NULL DEFAULT 0,
    onboarding_seen INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (user_id, community_id)
);

CREATE TABLE IF NOT EXISTS tappalka_sessions (
    session_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    community_id TEXT NOT NULL,
    post_a TEXT NOT NULL,
    post_b TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    resolved INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_tappalka_sessions_player
    ON tappalka_sessions(user_id, community_id, resolved);
"#;
