//! The page around the canvas.
//!
//! Buttons and pointer listeners forward to the event loop through the
//! proxy stored by [`install`]. The proxy is also what the exported
//! `setBackground` function talks to.

use std::cell::RefCell;

use wasm_bindgen::{JsCast, prelude::*};
use web_sys::{Document, HtmlElement, MouseEvent};
use winit::event_loop::EventLoopProxy;

use crate::{
    app::{DEFAULT_AMBIENT_COLOUR, DEFAULT_AMBIENT_INTENSITY, ViewerEvent},
    keys::{AbilityKey, ClassKey},
    manager::LoadProgress,
};

thread_local! {
    static PROXY: RefCell<Option<EventLoopProxy<ViewerEvent>>> = const { RefCell::new(None) };
}

fn send(event: ViewerEvent) {
    PROXY.with_borrow(|proxy| match proxy {
        Some(proxy) => {
            if proxy.send_event(event).is_err() {
                log::warn!("Viewer is no longer running.");
            }
        }
        None => log::warn!("Viewer is not running yet."),
    });
}

fn document() -> Option<Document> {
    web_sys::window()?.document()
}

fn element(id: &str) -> Option<HtmlElement> {
    document()?.get_element_by_id(id)?.dyn_into().ok()
}

/// Wires the selection buttons and document pointer events to the viewer.
pub fn install(proxy: EventLoopProxy<ViewerEvent>) {
    PROXY.with_borrow_mut(|slot| *slot = Some(proxy));
    let Some(document) = document() else {
        log::error!("No document to attach the controls to.");
        return;
    };

    on_buttons(&document, ".class-btn", |index| {
        ClassKey::from_button(index).map(ViewerEvent::SelectClass)
    });
    on_buttons(&document, ".ability-btn", |index| {
        AbilityKey::from_button(index).map(ViewerEvent::SelectAbility)
    });

    on_mouse(&document, "mousedown", |e| ViewerEvent::PointerDown {
        x: e.client_x() as f32,
        y: e.client_y() as f32,
    });
    on_mouse(&document, "mousemove", |e| ViewerEvent::PointerMove {
        x: e.client_x() as f32,
        y: e.client_y() as f32,
    });
    on_mouse(&document, "mouseup", |_| ViewerEvent::PointerUp);
}

/// Buttons are matched to keys by their position in the page.
fn on_buttons(document: &Document, selector: &str, to_event: fn(usize) -> Option<ViewerEvent>) {
    let buttons = match document.query_selector_all(selector) {
        Ok(buttons) => buttons,
        Err(e) => {
            log::warn!("Unable to find {}: {:?}", selector, e);
            return;
        }
    };
    for index in 0..buttons.length() {
        let Some(button) = buttons.get(index) else {
            continue;
        };
        let position = index as usize;
        let name = selector.to_string();
        let on_click = Closure::<dyn FnMut(web_sys::Event)>::new(move |_: web_sys::Event| {
            match to_event(position) {
                Some(event) => send(event),
                None => log::warn!("No model behind button {} of {}.", position + 1, name),
            }
        });
        if let Err(e) =
            button.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())
        {
            log::warn!("Unable to listen to {}: {:?}", selector, e);
        }
        on_click.forget();
    }
}

fn on_mouse(document: &Document, kind: &str, to_event: fn(&MouseEvent) -> ViewerEvent) {
    let listener = Closure::<dyn FnMut(MouseEvent)>::new(move |e: MouseEvent| send(to_event(&e)));
    if let Err(e) = document.add_event_listener_with_callback(kind, listener.as_ref().unchecked_ref())
    {
        log::warn!("Unable to listen to {}: {:?}", kind, e);
    }
    listener.forget();
}

pub fn show_progress(progress: LoadProgress) {
    let Some(bar) = element("loading-progress") else {
        return;
    };
    let percent = progress.percent().round();
    if let Err(e) = bar.style().set_property("width", &format!("{}%", percent)) {
        log::warn!("Unable to update the progress bar: {:?}", e);
    }
    bar.set_text_content(Some(&format!("{}%", percent)));
}

/// Fades the loading screen out; the page stylesheet animates the opacity.
pub fn hide_loading_screen() {
    let Some(screen) = element("loading-screen") else {
        return;
    };
    let style = screen.style();
    let faded = style
        .set_property("opacity", "0")
        .and_then(|_| style.set_property("pointer-events", "none"))
        .and_then(|_| screen.class_list().add_1("hidden"));
    if let Err(e) = faded {
        log::warn!("Unable to hide the loading screen: {:?}", e);
    }
}

pub fn show_load_error(message: &str) {
    if let Some(text) = element("loading-text") {
        text.set_text_content(Some(message));
    }
}

/// Replaces the whole page; there is nothing to show without a renderer.
pub fn show_unsupported(reason: &str) {
    let Some(body) = document().and_then(|d| d.body()) else {
        return;
    };
    body.set_text_content(None);
    let Some(message) = document().and_then(|d| d.create_element("div").ok()) else {
        return;
    };
    message.set_class_name("webgl-error");
    message.set_text_content(Some(&format!(
        "Your browser cannot display this viewer: {}",
        reason
    )));
    if let Err(e) = body.append_child(&message) {
        log::error!("Unable to show the error: {:?}", e);
    }
}

async fn fetch_image(url: &str) -> anyhow::Result<image::DynamicImage> {
    let page = web_sys::window()
        .ok_or_else(|| anyhow::anyhow!("no window"))?
        .location()
        .href()
        .map_err(|e| anyhow::anyhow!("no page address: {:?}", e))?;
    let url = reqwest::Url::parse(&page)?.join(url)?;
    let bytes = reqwest::get(url).await?.error_for_status()?.bytes().await?;
    Ok(image::load_from_memory(&bytes)?)
}

/// `setBackground(imageUrl?, ambientColor?, ambientIntensity?)`
///
/// Shows the image behind the models, or a solid backdrop in the ambient
/// colour when no image is given. The ambient light is updated either way.
/// An image that fails to load leaves everything as it was.
#[wasm_bindgen(js_name = setBackground)]
pub fn set_background(
    image_url: Option<String>,
    ambient_color: Option<u32>,
    ambient_intensity: Option<f32>,
) {
    let ambient_colour = ambient_color.unwrap_or(DEFAULT_AMBIENT_COLOUR);
    let ambient_intensity = ambient_intensity.unwrap_or(DEFAULT_AMBIENT_INTENSITY);
    let Some(url) = image_url else {
        send(ViewerEvent::SetBackground {
            image: None,
            ambient_colour,
            ambient_intensity,
        });
        return;
    };
    wasm_bindgen_futures::spawn_local(async move {
        match fetch_image(&url).await {
            Ok(image) => send(ViewerEvent::SetBackground {
                image: Some(image),
                ambient_colour,
                ambient_intensity,
            }),
            Err(e) => log::error!("Unable to load background {}: {:#}", url, e),
        }
    });
}
