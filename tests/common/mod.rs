#![allow(dead_code)]

pub mod app {
    use std::fs;
    use std::path::Path;

    use tempfile::TempDir;

    /// A throwaway application directory.
    pub struct TestApp {
        dir: TempDir,
    }

    impl TestApp {
        /// Write `config/<name>.yml` for every `(name, yaml)` pair.
        pub fn with_config(sections: &[(&str, &str)]) -> Self {
            let app = Self {
                dir: tempfile::tempdir().unwrap(),
            };
            for (name, yaml) in sections {
                app.write(&format!("config/{name}.yml"), yaml);
            }
            app
        }

        /// Write a file relative to the app directory, creating parents.
        pub fn write(&self, relative: &str, contents: impl AsRef<[u8]>) {
            let path = self.dir.path().join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, contents).unwrap();
        }

        pub fn path(&self) -> &Path {
            self.dir.path()
        }
    }
}

pub mod components {
    use std::sync::Arc;

    use bundlerouter::component::{ComponentClass, ComponentKind};
    use bundlerouter::error::ComponentError;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Shared event log components append to.
    #[derive(Clone, Default)]
    pub struct Recorder(Arc<Mutex<Vec<String>>>);

    impl Recorder {
        pub fn push(&self, event: impl Into<String>) {
            self.0.lock().push(event.into());
        }

        pub fn events(&self) -> Vec<String> {
            self.0.lock().clone()
        }
    }

    /// How a recording middleware completes its step.
    #[derive(Clone, Copy, Debug)]
    pub enum Step {
        Proceed,
        Fail,
        /// Signal from another thread after a short delay.
        ProceedLater,
        /// Drop the handle without signalling.
        Drop,
        /// Return an error from the method itself.
        Error,
    }

    /// Service `name` with a `handle` method that records and completes as
    /// told.
    pub fn middleware(name: &str, recorder: &Recorder, step: Step) -> Arc<ComponentClass> {
        let recorder = recorder.clone();
        let label = name.to_string();
        ComponentClass::builder(ComponentKind::Service, name, |_bundle| Ok(()))
            .method("handle", move |_: &(), instance| {
                recorder.push(format!("{label}:start"));
                let next = instance
                    .next()
                    .ok_or_else(|| ComponentError::failed("no continuation"))?;
                match step {
                    Step::Proceed => {
                        recorder.push(format!("{label}:proceed"));
                        next.proceed();
                    }
                    Step::Fail => {
                        next.fail(format!("{label} refused"));
                    }
                    Step::ProceedLater => {
                        let recorder = recorder.clone();
                        let label = label.clone();
                        std::thread::spawn(move || {
                            std::thread::sleep(std::time::Duration::from_millis(20));
                            recorder.push(format!("{label}:proceed"));
                            next.proceed();
                        });
                    }
                    Step::Drop => drop(next),
                    Step::Error => return Err(ComponentError::failed("middleware exploded")),
                }
                Ok(())
            })
            .build()
    }

    /// Controller `name` whose `show` method answers `ok` with its name, the
    /// route params and splats.
    pub fn echo_controller(name: &str, recorder: &Recorder) -> Arc<ComponentClass> {
        let recorder = recorder.clone();
        let label = name.to_string();
        ComponentClass::builder(ComponentKind::Controller, name, |_bundle| Ok(()))
            .method("show", move |_: &(), instance| {
                recorder.push(format!("{label}.show"));
                let request = instance.request();
                let params: serde_json::Map<String, serde_json::Value> = request
                    .params()
                    .iter()
                    .map(|(k, v)| (k.to_string(), json!(v)))
                    .collect();
                instance.response().ok(json!({
                    "controller": label,
                    "params": params,
                    "splats": request.splats(),
                }));
                Ok(())
            })
            .build()
    }
}

pub mod test_server {
    use std::sync::Once;

    static MAY_INIT: Once = Once::new();

    /// Configure the may runtime once per test binary.
    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }
}

pub mod dispatch {
    use std::path::Path;

    use bundlerouter::config::AppConfig;
    use bundlerouter::dispatcher::Dispatcher;
    use bundlerouter::framework::Framework;
    use bundlerouter::registry::Registries;

    /// Dispatcher over an inline YAML configuration.
    pub fn dispatcher(app_dir: &Path, yaml: &str, registries: Registries) -> Dispatcher {
        let config = AppConfig::from_yaml_str(app_dir, yaml).unwrap();
        Dispatcher::from_config(Framework::new(config, registries))
    }
}
