pub const MIG_0001_INIT: &str = r#"
BEGIN;

CREATE TABLE targets (
  id              INTEGER PRIMARY KEY AUTOINCREMENT,
  hostname        TEXT UNIQUE NOT NULL,
  ip_address      TEXT,
  status          TEXT NOT NULL DEFAULT 'new'
                  CHECK (status IN ('new','scanned','scan_failed','analysis_complete','analyzed_clean','compromised')),
  os              TEXT,
  state           TEXT CHECK (state IS NULL OR state IN ('up','down')),
  created_at      TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
  updated_at      TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE ports (
  id              INTEGER PRIMARY KEY AUTOINCREMENT,
  target_id       INTEGER NOT NULL REFERENCES targets(id),
  port_number     INTEGER NOT NULL CHECK (port_number BETWEEN 1 AND 65535),
  protocol        TEXT NOT NULL,
  service_name    TEXT,
  product         TEXT,
  version         TEXT,
  state           TEXT DEFAULT 'open',
  created_at      TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
  UNIQUE (target_id, port_number, protocol)
);

CREATE TABLE vulnerabilities (
  id              INTEGER PRIMARY KEY AUTOINCREMENT,
  target_id       INTEGER NOT NULL REFERENCES targets(id),
  port_id         INTEGER REFERENCES ports(id),
  type            TEXT NOT NULL,
  description     TEXT,
  tool            TEXT,
  command         TEXT,
  status          TEXT NOT NULL DEFAULT 'potential'
                  CHECK (status IN ('potential','confirmed','failed')),
  created_at      TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE credentials (
  id              INTEGER PRIMARY KEY AUTOINCREMENT,
  target_id       INTEGER REFERENCES targets(id),
  service         TEXT,
  username        TEXT,
  password        TEXT NOT NULL,
  type            TEXT,
  source          TEXT,
  created_at      TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE intelligence (
  id              INTEGER PRIMARY KEY AUTOINCREMENT,
  target_id       INTEGER REFERENCES targets(id),
  type            TEXT NOT NULL,
  source          TEXT,
  content         TEXT NOT NULL,
  created_at      TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TRIGGER update_targets_updated_at
AFTER UPDATE ON targets
FOR EACH ROW
BEGIN
  UPDATE targets SET updated_at = CURRENT_TIMESTAMP WHERE id = OLD.id;
END;

CREATE INDEX idx_targets_status ON targets(status);
CREATE INDEX idx_ports_target ON ports(target_id);
CREATE INDEX idx_vulns_target ON vulnerabilities(target_id, status);
CREATE INDEX idx_intel_dedup ON intelligence(content, type);

COMMIT;
"#;
