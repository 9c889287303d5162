use salvo::prelude::*;

const APP_CSS: &str = r#"
:root {
  --ink: #1d2733;
  --muted: #5b6b7c;
  --line: #d8dfe7;
  --accent: #0b7a52;
  --accent-soft: #e2f2eb;
  --paper: #f6f8fa;
}
* { box-sizing: border-box; }
body {
  margin: 0;
  font-family: "Helvetica Neue", Arial, sans-serif;
  color: var(--ink);
  background: var(--paper);
}
header {
  display: flex;
  justify-content: space-between;
  align-items: center;
  padding: 0.6rem 1.2rem;
  background: #ffffff;
  border-bottom: 1px solid var(--line);
}
header h1 { font-size: 1.1rem; margin: 0; }
header h1 a { color: var(--ink); text-decoration: none; }
header .logout button {
  background: none;
  border: 1px solid var(--line);
  border-radius: 4px;
  padding: 0.25rem 0.7rem;
  cursor: pointer;
}
nav {
  display: flex;
  flex-wrap: wrap;
  gap: 0.2rem;
  padding: 0.4rem 1.2rem;
  background: #ffffff;
  border-bottom: 1px solid var(--line);
}
nav a {
  padding: 0.3rem 0.6rem;
  border-radius: 4px;
  color: var(--muted);
  text-decoration: none;
  font-size: 0.9rem;
}
nav a.active, nav a:hover { background: var(--accent-soft); color: var(--accent); }
main { padding: 1.2rem; max-width: 1400px; margin: 0 auto; }
footer {
  padding: 0.6rem 1.2rem;
  color: var(--muted);
  font-size: 0.8rem;
  border-top: 1px solid var(--line);
}
h2 { margin: 0.4rem 0 0.8rem; }
h3 { margin: 1rem 0 0.5rem; }
.notice, .info, .error {
  padding: 0.6rem 0.9rem;
  border-radius: 4px;
  margin: 0.6rem 0;
  font-size: 0.9rem;
}
.notice { background: var(--accent-soft); color: var(--accent); }
.info { background: #e8eef5; color: var(--muted); }
.error { background: #fbe9e7; color: #9f3a2f; }
.metrics { display: flex; flex-wrap: wrap; gap: 0.8rem; margin: 0.8rem 0; }
.metric {
  background: #ffffff;
  border: 1px solid var(--line);
  border-radius: 6px;
  padding: 0.6rem 1rem;
  min-width: 9rem;
  display: flex;
  flex-direction: column;
}
.metric-value { font-size: 1.4rem; font-weight: 600; }
.metric-label { color: var(--muted); font-size: 0.8rem; }
.table-wrap { overflow-x: auto; background: #ffffff; border: 1px solid var(--line); border-radius: 6px; }
table { border-collapse: collapse; width: 100%; font-size: 0.85rem; }
th, td { text-align: left; padding: 0.4rem 0.6rem; border-bottom: 1px solid var(--line); white-space: nowrap; }
th { background: var(--paper); position: sticky; top: 0; }
td a { color: var(--accent); }
.chart { background: #ffffff; border: 1px solid var(--line); border-radius: 6px; padding: 0.8rem 1rem; margin: 0.8rem 0; }
.bar-row { display: flex; align-items: center; gap: 0.6rem; margin: 0.2rem 0; }
.bar-label { flex: 0 0 14rem; overflow: hidden; text-overflow: ellipsis; white-space: nowrap; font-size: 0.82rem; }
.bar-track { flex: 1; background: var(--paper); border-radius: 3px; }
.bar { display: block; height: 0.8rem; background: var(--accent); border-radius: 3px; }
.bar-count { flex: 0 0 4rem; text-align: right; font-size: 0.82rem; }
.filters {
  background: #ffffff;
  border: 1px solid var(--line);
  border-radius: 6px;
  padding: 0.8rem 1rem;
  margin-bottom: 1rem;
  display: flex;
  flex-wrap: wrap;
  gap: 0.8rem;
  align-items: flex-end;
}
.field { display: flex; flex-direction: column; gap: 0.2rem; font-size: 0.8rem; color: var(--muted); }
.field input, .field select { min-width: 10rem; padding: 0.3rem; border: 1px solid var(--line); border-radius: 4px; }
.filters button, .button {
  background: var(--accent);
  color: #ffffff;
  border: none;
  border-radius: 4px;
  padding: 0.45rem 0.9rem;
  cursor: pointer;
  text-decoration: none;
  font-size: 0.85rem;
  display: inline-block;
}
.button.secondary { background: #ffffff; color: var(--accent); border: 1px solid var(--accent); }
.pagination { display: flex; gap: 1rem; align-items: center; margin: 0.8rem 0; font-size: 0.9rem; }
.pagination .disabled { color: var(--muted); }
details { background: #ffffff; border: 1px solid var(--line); border-radius: 6px; padding: 0.5rem 0.8rem; margin: 0.4rem 0; }
details summary { cursor: pointer; font-weight: 500; }
.cards { display: grid; grid-template-columns: repeat(auto-fill, minmax(22rem, 1fr)); gap: 0.8rem; }
.login-box {
  max-width: 22rem;
  margin: 6rem auto;
  background: #ffffff;
  border: 1px solid var(--line);
  border-radius: 6px;
  padding: 1.5rem;
}
.login-box input { width: 100%; margin: 0.5rem 0 1rem; padding: 0.45rem; border: 1px solid var(--line); border-radius: 4px; }
.toolbar { display: flex; gap: 0.6rem; align-items: center; margin: 0.6rem 0; }
.quick-links { display: flex; flex-wrap: wrap; gap: 0.6rem; margin: 0.8rem 0; }
"#;

#[handler]
pub async fn stylesheet(res: &mut Response) {
    res.render(Text::Css(APP_CSS));
}
