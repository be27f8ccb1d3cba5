//! Artifact Generators - entry file, .htaccess, service worker, deploy README
//!
//! Every generator is a pure function of its inputs and returns file
//! contents; writing them is the pipeline's job.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::registry::FormRecord;

/// Process-wide values stamped into generated files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    pub version: String,
    pub started_at: DateTime<Utc>,
}

impl BuildContext {
    pub fn new(version: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            version: version.into(),
            started_at,
        }
    }

    /// Context for a run starting now, stamped with this crate's version.
    pub fn now() -> Self {
        Self::new(crate::TOOL_VERSION, Utc::now())
    }

    /// RFC 1123 rendering of the start time, as used in provenance comments.
    pub fn timestamp(&self) -> String {
        self.started_at.format("%a, %d %b %Y %H:%M:%S UTC").to_string()
    }
}

/// Fresh cache namespace: hex nanoseconds of `now` plus a random suffix.
pub fn cache_token(now: DateTime<Utc>) -> String {
    let nanos = now
        .timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1000));
    let nonce = Uuid::new_v4().simple().to_string();
    format!("{:x}{}", nanos, &nonce[..8])
}

/// Escape bytes for a single-quoted PHP literal. Only `\\` and `'` change,
/// so non-UTF-8 input passes through untouched.
pub fn escape_php_single_quoted(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len() + raw.len() / 8);
    for &b in raw {
        if b == b'\\' || b == b'\'' {
            out.push(b'\\');
        }
        out.push(b);
    }
    out
}

/// Make text safe inside a `/** ... */` block on a single line.
pub fn escape_doc_comment(s: &str) -> String {
    s.replace("*/", "* /")
        .replace(['\r', '\n'], " ")
}

/// `index.php`: embeds the raw form payload and hands off to the renderer.
pub fn render_entry(ctx: &BuildContext, record: &FormRecord, payload: &[u8]) -> Vec<u8> {
    let head = format!(
        r#"<?php
declare(strict_types=1);
/**
 * {name}
 * Generated by build-this v{version} on {timestamp}
 * Self-contained deployment -- do not edit.
 */

$form = json_decode('"#,
        name = escape_doc_comment(record.name()),
        version = ctx.version,
        timestamp = ctx.timestamp(),
    );
    let tail = r#"', true);
if (!$form) {
    http_response_code(500);
    die('Form data error.');
}
$isBuilderPreview = false;
require __DIR__ . '/src/builder/preview.php';
"#;

    let mut out = head.into_bytes();
    out.extend(escape_php_single_quoted(payload));
    out.extend_from_slice(tail.as_bytes());
    out
}

/// `.htaccess`: hides data files, sets cache lifetimes, routes to index.php.
pub fn render_htaccess(ctx: &BuildContext) -> String {
    format!(
        r#"# XcaliburMoon Web Development Pricing
# Generated by build-this at {timestamp}
# Do not edit this file directly.

Options -Indexes

<FilesMatch "\.(json|log|sqlite|sh|bak)$">
    <IfModule mod_authz_core.c>
        Require all denied
    </IfModule>
    <IfModule !mod_authz_core.c>
        Order deny,allow
        Deny from all
    </IfModule>
</FilesMatch>

<IfModule mod_expires.c>
    ExpiresActive On
    ExpiresDefault "access plus 1 month"
    ExpiresByType text/html "access plus 0 seconds"
    ExpiresByType text/css "access plus 1 year"
    ExpiresByType application/javascript "access plus 1 year"
</IfModule>

<IfModule mod_rewrite.c>
    RewriteEngine On
    RewriteBase /
    RewriteCond %{{REQUEST_FILENAME}} !-f
    RewriteCond %{{REQUEST_FILENAME}} !-d
    RewriteRule ^(.*)$ index.php [L,QSA]
</IfModule>
"#,
        timestamp = ctx.timestamp(),
    )
}

/// `sw.js`: precaches the shell and drops every cache but `xcm-cache-<token>`.
pub fn render_service_worker(token: &str) -> String {
    format!(
        r#"// XcaliburMoon Service Worker
// Generated by build-this
// Build hash: {token}

const CACHE_NAME = 'xcm-cache-{token}';

const PRECACHE_URLS = [
    '/',
    '/assets/css/main.css',
    '/assets/favicon.png',
];

self.addEventListener('install', function(event) {{
    event.waitUntil(
        caches.open(CACHE_NAME).then(function(cache) {{
            return cache.addAll(PRECACHE_URLS);
        }}).then(function() {{
            return self.skipWaiting();
        }})
    );
}});

self.addEventListener('activate', function(event) {{
    event.waitUntil(
        caches.keys().then(function(cacheNames) {{
            return Promise.all(
                cacheNames.filter(function(name) {{
                    return name !== CACHE_NAME;
                }}).map(function(name) {{
                    return caches.delete(name);
                }})
            );
        }}).then(function() {{
            return self.clients.claim();
        }})
    );
}});

self.addEventListener('fetch', function(event) {{
    if (event.request.method !== 'GET') {{ return; }}
    event.respondWith(
        caches.match(event.request).then(function(cached) {{
            var networkFetch = fetch(event.request).then(function(response) {{
                if (response && response.status === 200 && response.type === 'basic') {{
                    var responseClone = response.clone();
                    caches.open(CACHE_NAME).then(function(cache) {{
                        cache.put(event.request, responseClone);
                    }});
                }}
                return response;
            }});
            return cached || networkFetch;
        }})
    );
}});
"#
    )
}

/// `README.md`: how to deploy the package.
pub fn render_readme(ctx: &BuildContext, record: &FormRecord) -> String {
    format!(
        r#"# {name} - Deploy

**Build version**: {version}
**Build timestamp**: {timestamp}
**Form**: {name} (ID: {id})

## Technologies Included

| Component         | Version / Notes                        |
|-------------------|----------------------------------------|
| PHP               | 8.3+ required on host                  |
| Service Worker    | Generated by build-this                |

## Deployment Instructions

Upload the contents of this directory to the target folder on your server.
No build tools are required on the server. PHP 8.3+ and Apache or NGINX with rewrite support is all that is needed.

The form data is embedded in index.php. No database or external data files are needed.

Store SMTP credentials and API keys outside the web root before going live.
"#,
        name = record.name(),
        id = record.id(),
        version = ctx.version,
        timestamp = ctx.timestamp(),
    )
}
