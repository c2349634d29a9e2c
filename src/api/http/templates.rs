//! Embedded HTML for the status page.

/// Status page template. Pulls live numbers from `/api/metrics` and the
/// catalog from `/api/arrays`.
pub const HOME: &str = r#"<!doctype html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Strumok // Array Store</title>
    <style>
        :root {
            --bg: #09090b;
            --panel: #121214;
            --border: #27272a;
            --text: #ededed;
            --muted: #a1a1aa;
            --mono: "JetBrains Mono", "SF Mono", Consolas, monospace;
        }
        * { box-sizing: border-box; }
        body {
            margin: 0;
            background: var(--bg);
            color: var(--text);
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
        }
        .wrap { max-width: 860px; margin: 0 auto; padding: 40px 24px; }
        h1 { font-size: 20px; font-weight: 600; }
        h1 span { color: var(--muted); font-weight: 400; }
        .grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(180px, 1fr)); gap: 12px; margin: 24px 0; }
        .card { background: var(--panel); border: 1px solid var(--border); border-radius: 6px; padding: 14px; }
        .card .k { color: var(--muted); font-size: 12px; text-transform: uppercase; letter-spacing: .04em; }
        .card .v { font-family: var(--mono); font-size: 20px; margin-top: 6px; }
        table { width: 100%; border-collapse: collapse; font-family: var(--mono); font-size: 13px; }
        th, td { text-align: left; padding: 8px 10px; border-bottom: 1px solid var(--border); }
        th { color: var(--muted); font-weight: 500; }
        a { color: var(--muted); }
    </style>
</head>
<body>
<div class="wrap">
    <h1>strumok <span>array store</span></h1>
    <div class="grid" id="stats"></div>
    <h2 style="font-size:15px">Catalog</h2>
    <table>
        <thead><tr><th>name</th><th>rows</th><th>chunks</th><th>created</th></tr></thead>
        <tbody id="catalog"></tbody>
    </table>
    <p><a href="/metrics">prometheus metrics</a> &middot; <a href="/api/metrics">json metrics</a></p>
</div>
<script>
async function refresh() {
    const m = await (await fetch('/api/metrics')).json();
    const keys = ['arrays', 'storage_bytes', 'uploads', 'stream_queries',
                  'child_spawns', 'fetches', 'active_connections', 'uptime_secs'];
    document.getElementById('stats').innerHTML = keys.map(k =>
        `<div class="card"><div class="k">${k.replaceAll('_',' ')}</div><div class="v">${m[k]}</div></div>`
    ).join('');

    const a = await (await fetch('/api/arrays')).json();
    document.getElementById('catalog').innerHTML = a.arrays.map(e =>
        `<tr><td>${e.name}</td><td>${e.rows}</td><td>${e.chunks}</td><td>${e.created}</td></tr>`
    ).join('');
}
refresh();
setInterval(refresh, 5000);
</script>
</body>
</html>
"#;
