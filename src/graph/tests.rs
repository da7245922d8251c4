#[cfg(test)]
mod tests {
    use crate::backend::Tensor;
    use crate::graph::{Engine, NodeId};
    use crate::ops::{Add, Mul, Sum};
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_backward_accumulates_shared_inputs() {
        let mut engine = Engine::<f64>::new();
        let a = engine.create_variable(Tensor::from_vec(vec![1.0, 2.0], &[2]).unwrap(), true);
        let b = engine.create_variable(Tensor::from_vec(vec![3.0, 4.0], &[2]).unwrap(), true);
        let c = engine.apply_operation(Box::new(Add), vec![a, b]).unwrap();
        let d = engine.apply_operation(Box::new(Mul), vec![c, a]).unwrap();
        let loss = engine.apply_operation(Box::new(Sum::new()), vec![d]).unwrap();

        engine.backward(loss).unwrap();

        // d/da (a + b) * a = 2a + b
        assert_eq!(engine.get_gradient(a).unwrap().to_vec(), vec![5.0, 8.0]);
        // d/db (a + b) * a = a
        assert_eq!(engine.get_gradient(b).unwrap().to_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_constants_receive_no_gradient() {
        let mut engine = Engine::<f64>::new();
        let w = engine.create_variable(Tensor::from_vec(vec![2.0], &[1]).unwrap(), true);
        let x = engine.create_variable(Tensor::from_vec(vec![3.0], &[1]).unwrap(), false);
        let y = engine.apply_operation(Box::new(Mul), vec![w, x]).unwrap();
        let loss = engine.apply_operation(Box::new(Sum::new()), vec![y]).unwrap();
        engine.backward(loss).unwrap();

        assert_eq!(engine.get_gradient(w).unwrap().to_vec(), vec![3.0]);
        assert!(engine.get_gradient(x).is_none());
    }

    #[test]
    fn test_backward_is_noop_in_eval_mode() {
        let mut engine = Engine::<f64>::new();
        let w = engine.create_variable(Tensor::ones(&[2]), true);
        let loss = engine.apply_operation(Box::new(Sum::new()), vec![w]).unwrap();
        engine.set_training(false);
        engine.backward(loss).unwrap();
        assert!(engine.get_gradient(w).is_none());
    }

    #[test]
    fn test_named_parameters_survive_clear() {
        let mut engine = Engine::<f32>::new();
        let w = engine
            .create_parameter(Tensor::full(&[3], 0.6), "edge_weight/weights")
            .unwrap();
        engine.name_node(w, "edge_weight/normed_wts").unwrap();
        let tmp = engine.create_variable(Tensor::ones(&[3]), false);
        engine.name_node(tmp, "scratch").unwrap();
        let y = engine.apply_operation(Box::new(Mul), vec![w, tmp]).unwrap();
        let loss = engine.apply_operation(Box::new(Sum::new()), vec![y]).unwrap();
        engine.backward(loss).unwrap();

        engine.clear_transient();

        assert_eq!(engine.num_nodes(), 1);
        assert_eq!(engine.num_persistent_nodes(), 1);
        assert!(engine.get_gradient(w).is_none());
        assert_eq!(engine.node_by_name("edge_weight/normed_wts"), Some(w));
        assert!(engine.node_by_name("scratch").is_none());
        assert_eq!(engine.names(), vec!["edge_weight/normed_wts", "edge_weight/weights"]);
        assert_eq!(
            engine.tensor_by_name("edge_weight/normed_wts").unwrap().to_vec(),
            vec![0.6f32; 3]
        );
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let mut engine = Engine::<f64>::new();
        let a = engine.create_parameter(Tensor::ones(&[1]), "a").unwrap();
        let b = engine.create_parameter(Tensor::ones(&[1]), "b").unwrap();
        assert!(engine.create_parameter(Tensor::ones(&[1]), "a").is_err());
        assert!(engine.name_node(b, "a").is_err());
        assert!(engine.name_node(a, "a").is_ok());
    }

    #[test]
    fn test_update_parameter_checks_shape_and_kind() {
        let mut engine = Engine::<f64>::new();
        let w = engine.create_parameter(Tensor::ones(&[2]), "w").unwrap();
        assert!(engine.update_parameter(w, Tensor::zeros(&[3])).is_err());
        engine.update_parameter(w, Tensor::zeros(&[2])).unwrap();
        assert_eq!(engine.get_tensor(w).unwrap().to_vec(), vec![0.0, 0.0]);

        let s = engine.apply_operation(Box::new(Sum::new()), vec![w]).unwrap();
        assert!(engine.update_parameter(s, Tensor::scalar(1.0)).is_err());
    }

    #[test]
    fn test_node_id_atomicity() {
        let num_threads = 10;
        let ids_per_thread = 100;
        let barrier = Arc::new(Barrier::new(num_threads));

        let handles: Vec<_> = (0..num_threads)
            .map(|_| {
                let barrier_clone = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier_clone.wait();
                    (0..ids_per_thread).map(|_| NodeId::new()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all_ids = std::collections::HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all_ids.insert(id), "Duplicate ID found: {}", id);
            }
        }
        assert_eq!(all_ids.len(), num_threads * ids_per_thread);
    }
}
