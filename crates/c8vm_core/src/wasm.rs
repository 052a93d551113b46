use std::time::Duration;

use js_sys::Uint8Array;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, KeyboardEvent};

use c8vm_common::Key;
use crate::device::Keypad;
use crate::{Machine, MachineConfig, StepOutcome};

#[wasm_bindgen]
pub struct EmuWasm {
    machine: Machine,
    keypad: Keypad,
    ctx: CanvasRenderingContext2d,
}

#[wasm_bindgen]
impl EmuWasm {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<EmuWasm, JsValue> {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let canvas: HtmlCanvasElement = document
            .get_element_by_id("canvas")
            .ok_or_else(|| JsValue::from_str("no #canvas element"))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| JsValue::from_str("#canvas is not a canvas"))?;

        let ctx = canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("no 2d context"))?
            .dyn_into::<CanvasRenderingContext2d>()?;

        // the browser can't block, so key waits always return straight away
        let config = MachineConfig::builder()
            .key_wait_timeout(Duration::ZERO)
            .build();
        Ok(EmuWasm {
            machine: Machine::new(config),
            keypad: Keypad::new(),
            ctx,
        })
    }

    /// Returns false once the machine halted.
    #[wasm_bindgen]
    pub fn tick(&mut self) -> bool {
        match self.machine.step(&mut self.keypad) {
            Ok(StepOutcome::Executed | StepOutcome::AwaitingKey) => true,
            Err(e) => {
                log::error!("Emulation stopped: {}", e);
                false
            }
        }
    }

    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.machine.reset();
        self.keypad.release_all();
    }

    #[wasm_bindgen]
    pub fn set_key(&mut self, evt: KeyboardEvent, pressed: bool) {
        if let Some(k) = browser_key(&evt.key()).hex_keypad() {
            self.keypad.set_key(k as usize, pressed);
        }
    }

    #[wasm_bindgen]
    pub fn load_game(&mut self, data: Uint8Array) -> Result<(), JsValue> {
        self.machine
            .load(&data.to_vec())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen]
    pub fn draw_screen(&mut self, scale: usize) {
        for (x, y, lit) in self.machine.framebuffer().pixels() {
            if lit {
                self.ctx.fill_rect(
                    (x * scale) as f64,
                    (y * scale) as f64,
                    scale as f64,
                    scale as f64,
                );
            }
        }
    }
}

fn browser_key(key: &str) -> Key {
    match key {
        "1" => Key::Num1,
        "2" => Key::Num2,
        "3" => Key::Num3,
        "4" => Key::Num4,
        "q" | "Q" => Key::Q,
        "w" | "W" => Key::W,
        "e" | "E" => Key::E,
        "r" | "R" => Key::R,
        "a" | "A" => Key::A,
        "s" | "S" => Key::S,
        "d" | "D" => Key::D,
        "f" | "F" => Key::F,
        "z" | "Z" => Key::Z,
        "x" | "X" => Key::X,
        "c" | "C" => Key::C,
        "v" | "V" => Key::V,
        _ => Key::None,
    }
}
