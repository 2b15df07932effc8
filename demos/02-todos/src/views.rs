//! HTML fragments for the todo list.

use plinth_core::data::Record;
use plinth_core::hypermedia::escape;

pub fn page(todos: &[Record]) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8" />
<meta name="viewport" content="width=device-width, initial-scale=1" />
<title>Todos</title>
<link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/franken-ui@2.1.1/dist/css/core.min.css" />
<link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/franken-ui@2.1.1/dist/css/utilities.min.css" />
<script type="module" src="https://cdn.jsdelivr.net/gh/starfederation/datastar@v1.0.0/bundles/datastar.js"></script>
</head>
<body>
<main class="max-w-md mx-auto p-4 flex flex-col gap-4">
<h1 class="text-xl font-semibold">Todos</h1>
<div class="flex gap-2">
<input data-bind-title class="border rounded-lg p-2 text-sm flex-1" type="text" placeholder="Something to do" data-on-keydown="evt.key === 'Enter' &amp;&amp; @post('/add-todo')" />
<button data-on-click="@post('/add-todo')" class="btn btn-primary" type="button">Add</button>
</div>
{list}
</main>
</body>
</html>"#,
        list = todo_list(todos),
    )
}

pub fn todo_list(todos: &[Record]) -> String {
    if todos.is_empty() {
        return empty_state();
    }
    let items: Vec<String> = todos.iter().map(todo_item).collect();
    format!(
        "<ul id=\"todo-list\" class=\"flex flex-col gap-2 list-none p-0\">\n{}\n</ul>",
        items.join("\n")
    )
}

pub fn empty_state() -> String {
    "<div id=\"todo-empty\" class=\"text-sm text-muted-foreground border rounded-lg p-6 text-center\">Nothing to do. Enjoy it.</div>"
        .to_string()
}

pub fn todo_item(record: &Record) -> String {
    let id = record.get("id").and_then(|v| v.as_i64()).unwrap_or_default();
    let title = record.get("title").and_then(|v| v.as_str()).unwrap_or_default();
    let done = record.get("done").and_then(|v| v.as_bool()).unwrap_or(false);

    format!(
        r#"<li id="todo-{id}" class="flex items-center gap-2 border rounded-lg p-3">
<input type="checkbox"{checked} data-on-click="@post('/toggle-todo/{id}/{next}')" />
<span class="text-sm{strike}">{title}</span>
</li>"#,
        checked = if done { " checked" } else { "" },
        next = !done,
        strike = if done { " line-through text-muted-foreground" } else { "" },
        title = escape(title),
    )
}
